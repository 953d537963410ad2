//! Shared WebSocket connection state
//!
//! Used by the connection state machine and both socket drivers.

/// WebSocket connection state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WsState {
    Connecting,
    Connected,
    Disconnected,
    /// Shut down explicitly; no further reconnects
    Closed,
}

impl WsState {
    pub fn is_connected(&self) -> bool {
        matches!(self, WsState::Connected)
    }

    pub fn label(&self) -> &'static str {
        match self {
            WsState::Connecting => "connecting",
            WsState::Connected => "connected",
            WsState::Disconnected => "disconnected",
            WsState::Closed => "closed",
        }
    }
}
