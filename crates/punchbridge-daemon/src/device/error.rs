//! Device session error type.

use std::time::Duration;

use thiserror::Error;

use punchbridge_proto::{commands, ProtocolError};

/// Errors raised while talking to one terminal.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("connection failed: {0}")]
    Connect(std::io::Error),

    #[error("command {} timed out after {timeout:?}", commands::name(*.command))]
    CommandTimeout { command: u16, timeout: Duration },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("device rejected {}", commands::name(*.0))]
    Rejected(u16),

    #[error("not connected")]
    NotConnected,
}
