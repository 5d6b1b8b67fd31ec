//! Transport traits

use std::time::Duration;

use async_trait::async_trait;

use super::TransportError;
use crate::config::SerialSettings;

/// One open, line-oriented connection to the controller
///
/// Dropping the link releases the underlying handle.
#[async_trait]
pub trait SerialLink: Send {
    /// Write one line; the `\n` terminator is appended
    async fn write_line(&mut self, line: &str) -> Result<(), TransportError>;

    /// Read one line, waiting at most `timeout`; the terminator and
    /// surrounding whitespace are stripped
    async fn read_line(&mut self, timeout: Duration) -> Result<String, TransportError>;

    /// Discard everything received but not yet read, including replies that
    /// arrived after an earlier read gave up
    async fn clear_input(&mut self) -> Result<(), TransportError>;

    /// Flush and release the handle
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Human-readable endpoint name for logs
    fn endpoint(&self) -> &str;
}

/// Factory for links; one call to `open` produces one handle
#[async_trait]
pub trait LinkOpener: Send + Sync {
    async fn open(&self, settings: &SerialSettings) -> Result<Box<dyn SerialLink>, TransportError>;
}
