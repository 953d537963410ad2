//! Error types for constructing clients and controllers

use thiserror::Error;

/// Errors surfaced to whoever wires the glue up.
///
/// Runtime connection loss is not an error here; it is handled by the
/// reconnect cycle.
#[derive(Debug, Error)]
pub enum UplinkError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("element not found: #{0}")]
    MissingElement(String),

    #[error("browser API unavailable: {0}")]
    Unavailable(&'static str),

    #[error("socket error: {0}")]
    Socket(String),
}

pub type Result<T, E = UplinkError> = std::result::Result<T, E>;
