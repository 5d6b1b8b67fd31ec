//! Common error types for device sessions

use thiserror::Error;

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors that can occur while talking to a hardware device
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DeviceError {
    /// Operation requires an open connection
    #[error("Device not connected: {0}")]
    NotConnected(String),

    /// Transport/communication error (port open, write, read)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Device answered, but not with what the protocol expects
    #[error("Unexpected reply: expected '{expected}', got '{received}'")]
    UnexpectedReply {
        /// Reply the protocol requires
        expected: String,
        /// Reply actually read from the device
        received: String,
    },

    /// No reply within the configured read timeout
    #[error("Timed out waiting for device reply")]
    Timeout,

    /// Invalid parameter or request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Vendor SDK call returned a failure code
    #[error("SDK call {call} failed with code {code}")]
    Sdk {
        /// Name of the native call
        call: &'static str,
        /// Numeric result code
        code: u32,
    },

    /// A hardware safety interlock is not satisfied
    #[error("Safety interlock not set: {0}")]
    SafetyInterlock(String),

    /// Operation was cancelled through its cancellation token
    #[error("Operation cancelled")]
    Cancelled,

    /// Polling did not reach its terminal condition within the maximum wait
    #[error("Gave up waiting for {0}")]
    PollTimeout(String),

    /// Another operation holds the device
    #[error("Device busy: {0}")]
    Busy(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeviceError {
    /// Returns the HTTP status code for this error
    ///
    /// Device and transport failures all surface as 500; only malformed
    /// requests are the caller's fault.
    pub fn status_code(&self) -> u16 {
        match self {
            DeviceError::InvalidRequest(_) => 400,
            DeviceError::Busy(_) => 409,
            _ => 500,
        }
    }

    /// Whether the device replied with something the protocol does not accept
    pub fn is_protocol_mismatch(&self) -> bool {
        matches!(self, DeviceError::UnexpectedReply { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(DeviceError::InvalidRequest("x".into()).status_code(), 400);
        assert_eq!(DeviceError::Timeout.status_code(), 500);
        assert_eq!(DeviceError::NotConnected("mux".into()).status_code(), 500);
        assert_eq!(DeviceError::Busy("scan".into()).status_code(), 409);
    }

    #[test]
    fn test_unexpected_reply_message() {
        let err = DeviceError::UnexpectedReply {
            expected: "MUX_SET 3".into(),
            received: "MUX_SET 4".into(),
        };
        assert!(err.is_protocol_mismatch());
        assert_eq!(
            err.to_string(),
            "Unexpected reply: expected 'MUX_SET 3', got 'MUX_SET 4'"
        );
    }
}
