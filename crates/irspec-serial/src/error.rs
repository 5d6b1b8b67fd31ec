//! Transport layer errors

use irspec_core::DeviceError;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Transport not supported: {0}")]
    Unsupported(String),
}

impl From<TransportError> for DeviceError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(_) => DeviceError::Timeout,
            other => DeviceError::Transport(other.to_string()),
        }
    }
}
