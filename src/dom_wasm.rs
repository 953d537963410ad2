//! Browser element bindings

use crate::core::{ElementHandle, UplinkError};

impl ElementHandle for web_sys::Element {
    fn set_text(&self, text: &str) {
        self.set_text_content(Some(text));
    }

    fn set_inner_html(&self, html: &str) {
        web_sys::Element::set_inner_html(self, html);
    }

    fn class_name(&self) -> String {
        web_sys::Element::class_name(self)
    }

    fn set_class_name(&self, value: &str) {
        web_sys::Element::set_class_name(self, value);
    }
}

pub fn window() -> Result<web_sys::Window, UplinkError> {
    web_sys::window().ok_or(UplinkError::Unavailable("window"))
}

/// Look up an element by id
pub fn element_by_id(id: &str) -> Result<web_sys::Element, UplinkError> {
    window()?
        .document()
        .ok_or(UplinkError::Unavailable("document"))?
        .get_element_by_id(id)
        .ok_or_else(|| UplinkError::MissingElement(id.to_string()))
}

impl From<UplinkError> for wasm_bindgen::JsValue {
    fn from(err: UplinkError) -> Self {
        wasm_bindgen::JsError::new(&err.to_string()).into()
    }
}
