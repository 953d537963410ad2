//! WASM WebSocket driver for the connection status client
//!
//! Owns the browser socket and `setTimeout` handles and executes the
//! commands produced by [`ConnectionStatus`]. Callbacks hold weak references,
//! so dropping the client stops everything.

use crate::core::{Command, ConnectionConfig, ConnectionStatus, StatusElements, TimerId};
use crate::dom_wasm::window;
use crate::ws_state::WsState;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, error, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CloseEvent, Element, MessageEvent, WebSocket};

/// Socket plus the callbacks attached to it
struct LiveSocket {
    ws: WebSocket,
    _on_open: Closure<dyn FnMut(JsValue)>,
    _on_message: Closure<dyn FnMut(MessageEvent)>,
    _on_close: Closure<dyn FnMut(CloseEvent)>,
}

impl LiveSocket {
    fn detach(&self) {
        self.ws.set_onopen(None);
        self.ws.set_onmessage(None);
        self.ws.set_onclose(None);
    }
}

struct Inner {
    machine: ConnectionStatus<Element>,
    socket: Option<LiveSocket>,
    /// Last detached socket; its callback may still be on the stack
    retired: Option<LiveSocket>,
    timers: HashMap<TimerId, i32>,
}

type Shared = Rc<RefCell<Inner>>;

thread_local! {
    /// Clients that live until page unload regardless of their handle
    static PINNED: RefCell<Vec<Shared>> = const { RefCell::new(Vec::new()) };
}

/// WASM connection status client
pub struct WsClient {
    inner: Shared,
    pinned: bool,
}

impl WsClient {
    /// Create the client and open the first socket
    pub fn connect(config: ConnectionConfig, elements: StatusElements<Element>) -> Self {
        let inner = Rc::new(RefCell::new(Inner {
            machine: ConnectionStatus::new(config, elements),
            socket: None,
            retired: None,
            timers: HashMap::new(),
        }));
        dispatch(&inner, |m| m.connect());
        Self {
            inner,
            pinned: false,
        }
    }

    /// Keep the client running after this handle is dropped.
    /// Only an explicit [`WsClient::shutdown`] stops it.
    pub fn pin(mut self) -> Self {
        PINNED.with(|pinned| pinned.borrow_mut().push(self.inner.clone()));
        self.pinned = true;
        self
    }

    pub fn state(&self) -> WsState {
        self.inner.borrow().machine.state()
    }

    pub fn is_degraded(&self) -> bool {
        self.inner.borrow().machine.is_degraded()
    }

    pub fn attempts(&self) -> u64 {
        self.inner.borrow().machine.attempts()
    }

    /// Cancel pending timers and close the socket. No reconnects afterwards.
    pub fn shutdown(&self) {
        dispatch(&self.inner, |m| m.shutdown());
    }
}

impl Drop for WsClient {
    fn drop(&mut self) {
        if !self.pinned {
            self.shutdown();
        }
    }
}

/// Run one state machine step, then execute its commands with no borrow held
fn dispatch(
    inner: &Shared,
    step: impl FnOnce(&mut ConnectionStatus<Element>) -> Vec<Command>,
) {
    let commands = step(&mut inner.borrow_mut().machine);
    execute(inner, commands);
}

fn execute(inner: &Shared, commands: Vec<Command>) {
    for command in commands {
        match command {
            Command::Open { url } => {
                if let Err(e) = open_socket(inner, &url) {
                    // construction failure takes the regular close path
                    error!(?e, url = %url, "Failed to create WebSocket");
                    dispatch(inner, |m| m.on_close());
                }
            }
            Command::Close => close_socket(inner),
            Command::Schedule { id, kind, delay_ms } => {
                if let Err(e) = schedule(inner, id, delay_ms) {
                    error!(?e, ?kind, "Failed to schedule timer");
                }
            }
            Command::Cancel { id } => {
                let handle = inner.borrow_mut().timers.remove(&id);
                if let (Some(handle), Ok(window)) = (handle, window()) {
                    window.clear_timeout_with_handle(handle);
                }
            }
        }
    }
}

fn open_socket(inner: &Shared, url: &str) -> Result<(), JsValue> {
    let ws = WebSocket::new(url)?;
    let weak = Rc::downgrade(inner);

    // On open - clear degraded status
    let w = weak.clone();
    let on_open = Closure::wrap(Box::new(move |_: JsValue| {
        if let Some(inner) = w.upgrade() {
            dispatch(&inner, |m| m.on_open());
        }
    }) as Box<dyn FnMut(JsValue)>);
    ws.set_onopen(Some(on_open.as_ref().unchecked_ref()));

    // On message - payload is pre-rendered markup for the info element
    let w = weak.clone();
    let on_message = Closure::wrap(Box::new(move |e: MessageEvent| {
        let Some(inner) = w.upgrade() else { return };
        match e.data().dyn_into::<js_sys::JsString>() {
            Ok(txt) => {
                let payload: String = txt.into();
                inner.borrow_mut().machine.on_message(&payload);
            }
            Err(_) => debug!("Non-text frame ignored"),
        }
    }) as Box<dyn FnMut(MessageEvent)>);
    ws.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

    // On close - error or normal, same retry path
    let w = weak;
    let on_close = Closure::wrap(Box::new(move |e: CloseEvent| {
        warn!(code = e.code(), reason = %e.reason(), "WebSocket closed");
        if let Some(inner) = w.upgrade() {
            dispatch(&inner, |m| m.on_close());
        }
    }) as Box<dyn FnMut(CloseEvent)>);
    ws.set_onclose(Some(on_close.as_ref().unchecked_ref()));

    let live = LiveSocket {
        ws,
        _on_open: on_open,
        _on_message: on_message,
        _on_close: on_close,
    };

    let mut guard = inner.borrow_mut();
    if let Some(old) = guard.socket.take() {
        old.detach();
        if let Err(e) = old.ws.close() {
            debug!(?e, "Replaced socket close failed");
        }
        guard.retired = Some(old);
    }
    guard.socket = Some(live);
    Ok(())
}

fn close_socket(inner: &Shared) {
    let mut guard = inner.borrow_mut();
    if let Some(live) = guard.socket.take() {
        live.detach();
        if let Err(e) = live.ws.close() {
            debug!(?e, "Socket close failed");
        }
        guard.retired = Some(live);
    }
}

fn schedule(inner: &Shared, id: TimerId, delay_ms: u32) -> Result<(), JsValue> {
    let weak = Rc::downgrade(inner);
    let callback = Closure::once_into_js(move || {
        let Some(inner) = weak.upgrade() else { return };
        inner.borrow_mut().timers.remove(&id);
        dispatch(&inner, |m| m.on_timer(id));
    });

    let delay = i32::try_from(delay_ms).unwrap_or(i32::MAX);
    let handle = window()?
        .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), delay)?;
    inner.borrow_mut().timers.insert(id, handle);
    Ok(())
}
