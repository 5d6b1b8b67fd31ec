//! DeviceSession trait - the core abstraction over one physical connection

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DeviceResult;

/// Static description of a device session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Short identifier (e.g., "arduino_uno_r4")
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Device type label reported to clients
    pub device_type: String,
    /// Port or address the session connects to
    pub address: String,
}

/// Connection lifecycle of a device session
///
/// ```text
/// Disconnected → Connecting → Connected → Disconnected
///                     │
///                     └──(probe/I/O failure)──→ Disconnected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(s)
    }
}

/// A stateful connection to one piece of hardware, shared by every request
/// for that device.
///
/// Implementations hold at most one live connection handle. `connect` on an
/// already connected session reuses the existing handle, and `disconnect` is
/// idempotent.
#[async_trait]
pub trait DeviceSession: Send + Sync {
    /// Get device information
    fn device_info(&self) -> &DeviceInfo;

    /// Current connection state
    fn state(&self) -> ConnectionState;

    /// Shorthand for `state() == Connected`
    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Open the connection and verify the device answers
    async fn connect(&self) -> DeviceResult<()>;

    /// Release the connection; always ends `Disconnected`
    async fn disconnect(&self) -> DeviceResult<()>;
}
