//! Platform-agnostic core module - shared between the browser build and CLI

pub mod class_list;
pub mod config;
pub mod connection;
pub mod element;
pub mod error;
pub mod upload;

pub use config::{ConnectionConfig, UploadConfig, DEFAULT_WS_URL};
pub use connection::{Command, ConnectionStatus, StatusElements, TimerId, TimerKind};
pub use element::{ElementHandle, MemoryElement};
pub use error::{Result, UplinkError};
pub use upload::{UploadEvent, UploadPhase, UploadQueue, UploadSession, UploadStatus};
