//! Client and controller configuration
//!
//! Accepts the option names used by the existing page scripts
//! (`url`, `reconnectDelay`, `msgClose`) as aliases.

use super::error::{Result, UplinkError};
use serde::{Deserialize, Serialize};

/// Default WebSocket endpoint (override with UPLINK_WS env var in the CLI)
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8080/ws";
pub const DEFAULT_RECONNECT_DELAY_MS: u32 = 1000;
pub const DEFAULT_ERROR_REPORT_DELAY_MS: u32 = 5000;
/// Bound on the opening handshake of the native client
pub const DEFAULT_CONNECT_TIMEOUT_MS: u32 = 5000;
pub const DEFAULT_DISCONNECTED_MESSAGE: &str = "connection lost";
/// Marker class applied to the info element while degraded
pub const DEFAULT_MARKER_CLASS: &str = "xconn";
/// Marker class hiding the browser panel during an upload run
pub const DEFAULT_HIDDEN_CLASS: &str = "hidden";

/// Connection status client settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionConfig {
    #[serde(alias = "url")]
    pub endpoint_url: String,
    #[serde(alias = "reconnectDelay")]
    pub reconnect_delay_ms: u32,
    #[serde(alias = "errorReportDelay")]
    pub error_report_delay_ms: u32,
    /// A handshake still pending after this long counts as a close.
    /// Browsers apply their own limit, so only the native driver reads it.
    #[serde(alias = "connectTimeout")]
    pub connect_timeout_ms: u32,
    /// Status text shown while connected (empty when unset)
    #[serde(alias = "msgOpen")]
    pub connected_message: Option<String>,
    /// Status text shown once the connection has been down for
    /// `error_report_delay_ms`
    #[serde(alias = "msgClose")]
    pub disconnected_message: String,
    pub marker_class: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint_url: DEFAULT_WS_URL.to_string(),
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            error_report_delay_ms: DEFAULT_ERROR_REPORT_DELAY_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            connected_message: None,
            disconnected_message: DEFAULT_DISCONNECTED_MESSAGE.to_string(),
            marker_class: DEFAULT_MARKER_CLASS.to_string(),
        }
    }
}

impl ConnectionConfig {
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            ..Self::default()
        }
    }

    /// Parse and validate a JSON config document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.endpoint_url.trim();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(UplinkError::InvalidConfig(format!(
                "endpoint must be a ws:// or wss:// URL, got {:?}",
                self.endpoint_url
            )));
        }
        if self.connect_timeout_ms == 0 {
            return Err(UplinkError::InvalidConfig(
                "connect timeout must be positive".to_string(),
            ));
        }
        if self.marker_class.split_whitespace().count() != 1 {
            return Err(UplinkError::InvalidConfig(format!(
                "marker class must be a single class name, got {:?}",
                self.marker_class
            )));
        }
        Ok(())
    }

    /// Status text for the connected state
    pub fn connected_text(&self) -> &str {
        self.connected_message.as_deref().unwrap_or("")
    }
}

/// Upload status controller settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadConfig {
    pub hidden_class: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            hidden_class: DEFAULT_HIDDEN_CLASS.to_string(),
        }
    }
}

impl UploadConfig {
    pub fn validate(&self) -> Result<()> {
        if self.hidden_class.split_whitespace().count() != 1 {
            return Err(UplinkError::InvalidConfig(format!(
                "hidden class must be a single class name, got {:?}",
                self.hidden_class
            )));
        }
        Ok(())
    }
}
