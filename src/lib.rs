//! uplink-ui - status glue for the file upload pages
//!
//! - Connection status: a WebSocket client that mirrors connection health
//!   into two page elements and reconnects forever
//! - Upload status: hides the file browser panel while an upload queue runs
//!
//! The state machines live in [`core`] and run unchanged in the browser
//! (`--features wasm`) and in the native monitor (`--features cli`).

pub mod core;
pub mod time;
pub mod ws_state;

#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
mod dom_wasm;
#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
mod upload_wasm;
#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
mod websocket_wasm;

#[cfg(all(not(target_arch = "wasm32"), feature = "cli"))]
pub mod websocket_native;

#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
pub use bindings::*;

/// Entry points exported to page scripts
#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
mod bindings {
    use crate::core::{ConnectionConfig, StatusElements, UploadConfig, UplinkError};
    use crate::dom_wasm::element_by_id;
    use crate::upload_wasm::{Dropzone, UploadWatcher};
    use crate::websocket_wasm::WsClient;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen::JsCast;

    #[wasm_bindgen(start)]
    pub fn start() {
        console_error_panic_hook::set_once();

        // Initialize tracing for browser console
        tracing_wasm::set_as_global_default();
    }

    /// Connection status client.
    ///
    /// Dropping (or garbage collecting) a client built with `new` or
    /// `fromIds` shuts it down, so keep the handle. Clients from
    /// `websocket()` run until `shutdown()` or page unload.
    #[wasm_bindgen]
    pub struct StatusClient {
        client: WsClient,
    }

    #[wasm_bindgen]
    impl StatusClient {
        /// Connect using a config object and the two status elements
        #[wasm_bindgen(constructor)]
        pub fn new(
            config: JsValue,
            status: web_sys::Element,
            info: web_sys::Element,
        ) -> Result<StatusClient, JsValue> {
            let config = connection_config(config)?;
            Ok(Self {
                client: WsClient::connect(config, StatusElements { status, info }),
            })
        }

        /// Same as the constructor, with element ids
        #[wasm_bindgen(js_name = fromIds)]
        pub fn from_ids(
            config: JsValue,
            status_id: &str,
            info_id: &str,
        ) -> Result<StatusClient, JsValue> {
            let status = element_by_id(status_id)?;
            let info = element_by_id(info_id)?;
            Self::new(config, status, info)
        }

        pub fn state(&self) -> String {
            self.client.state().label().to_string()
        }

        #[wasm_bindgen(js_name = isConnected)]
        pub fn is_connected(&self) -> bool {
            self.client.state().is_connected()
        }

        #[wasm_bindgen(js_name = isDegraded)]
        pub fn is_degraded(&self) -> bool {
            self.client.is_degraded()
        }

        pub fn attempts(&self) -> u64 {
            self.client.attempts()
        }

        /// Stop reconnecting and close the socket
        pub fn shutdown(&self) {
            self.client.shutdown();
        }
    }

    /// Drop-in for the page scripts' `websocket({url, elementStatus,
    /// elementInfo, reconnectDelay, msgClose})` call. The client stays
    /// alive even if the returned handle is discarded.
    #[wasm_bindgen]
    pub fn websocket(config: JsValue) -> Result<StatusClient, JsValue> {
        let status = element_field(&config, "elementStatus")?;
        let info = element_field(&config, "elementInfo")?;
        let config = connection_config(config)?;
        // page scripts discard the return value
        Ok(StatusClient {
            client: WsClient::connect(config, StatusElements { status, info }).pin(),
        })
    }

    /// Upload status controller attached to a Dropzone widget
    #[wasm_bindgen]
    pub struct UploadStatusHandle {
        watcher: UploadWatcher,
    }

    #[wasm_bindgen]
    impl UploadStatusHandle {
        pub fn phase(&self) -> String {
            self.watcher.phase().label().to_string()
        }

        /// Successful uploads waiting for the queue to complete
        pub fn pending(&self) -> usize {
            self.watcher.pending()
        }
    }

    #[wasm_bindgen(js_name = watchUploads)]
    pub fn watch_uploads(
        dropzone: Dropzone,
        panel: web_sys::Element,
        config: JsValue,
    ) -> Result<UploadStatusHandle, JsValue> {
        let config: UploadConfig = if config.is_undefined() || config.is_null() {
            UploadConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)?
        };
        config.validate()?;
        Ok(UploadStatusHandle {
            watcher: UploadWatcher::attach(dropzone, panel, config),
        })
    }

    fn connection_config(value: JsValue) -> Result<ConnectionConfig, JsValue> {
        let config: ConnectionConfig = if value.is_undefined() || value.is_null() {
            ConnectionConfig::default()
        } else {
            serde_wasm_bindgen::from_value(value)?
        };
        config.validate()?;
        Ok(config)
    }

    fn element_field(config: &JsValue, key: &'static str) -> Result<web_sys::Element, JsValue> {
        js_sys::Reflect::get(config, &JsValue::from_str(key))?
            .dyn_into::<web_sys::Element>()
            .map_err(|_| UplinkError::InvalidConfig(format!("{key} is not an element")).into())
    }
}
