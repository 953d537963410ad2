//! Browser binding for the upload status controller
//!
//! Subscribes to a Dropzone-style widget (`on(event, callback)` and
//! `removeFile(file)`). The widget lives as long as the page, so the
//! callbacks are leaked with `forget()`.

use crate::core::{UploadConfig, UploadEvent, UploadPhase, UploadQueue, UploadStatus};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::info;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::Element;

#[wasm_bindgen]
extern "C" {
    /// Upload queue widget supplied by the page
    #[derive(Clone, Debug)]
    pub type Dropzone;

    #[wasm_bindgen(method)]
    fn on(this: &Dropzone, event: &str, callback: &js_sys::Function);

    #[wasm_bindgen(method, js_name = removeFile)]
    fn js_remove_file(this: &Dropzone, file: &JsValue);
}

impl UploadQueue for Dropzone {
    type File = JsValue;

    fn remove_file(&self, file: &JsValue) {
        self.js_remove_file(file);
    }
}

type SharedStatus = Rc<RefCell<UploadStatus<Element, JsValue>>>;

/// Upload status controller attached to a widget
pub struct UploadWatcher {
    status: SharedStatus,
}

impl UploadWatcher {
    pub fn attach(dropzone: Dropzone, panel: Element, config: UploadConfig) -> Self {
        let status: SharedStatus = Rc::new(RefCell::new(UploadStatus::new(panel, config)));

        forward(&dropzone, &status, "addedfile", |_| UploadEvent::FileAdded);
        forward(&dropzone, &status, "success", UploadEvent::UploadSucceeded);
        forward(&dropzone, &status, "queuecomplete", |_| UploadEvent::QueueComplete);

        info!("Upload watcher attached");
        Self { status }
    }

    pub fn phase(&self) -> UploadPhase {
        self.status.borrow().phase()
    }

    pub fn pending(&self) -> usize {
        self.status.borrow().session().len()
    }
}

/// Feed one widget event into the controller
fn forward(
    dropzone: &Dropzone,
    status: &SharedStatus,
    event: &str,
    to_event: impl Fn(JsValue) -> UploadEvent<JsValue> + 'static,
) {
    let status = status.clone();
    let queue = dropzone.clone();
    let callback = Closure::wrap(Box::new(move |file: JsValue| {
        status.borrow_mut().handle(to_event(file), &queue);
    }) as Box<dyn FnMut(JsValue)>);
    dropzone.on(event, callback.as_ref().unchecked_ref());
    callback.forget();
}
