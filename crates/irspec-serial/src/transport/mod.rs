//! Transport layer for the multiplexer controller
//!
//! This module provides link implementations:
//! - Serial port via tokio-serial (feature `serial`)
//! - Mock link backed by simulated firmware, for tests and hardware-free runs
//!
//! # Example
//!
//! ```ignore
//! use irspec_serial::config::ArduinoConfig;
//! use irspec_serial::transport::create_opener;
//!
//! let config = ArduinoConfig::default();
//! let opener = create_opener(&config)?;
//! let mut link = opener.open(&config.serial_settings()).await?;
//! link.write_line("PING").await?;
//! let reply = link.read_line(config.read_timeout()).await?;
//! ```

mod adapter;
pub mod mock;

#[cfg(feature = "serial")]
pub mod serial;

pub use crate::error::TransportError;
pub use adapter::{LinkOpener, SerialLink};

use std::sync::Arc;

use crate::config::{ArduinoConfig, TransportKind};

/// Create a link opener based on configuration
pub fn create_opener(config: &ArduinoConfig) -> Result<Arc<dyn LinkOpener>, TransportError> {
    match config.transport {
        #[cfg(feature = "serial")]
        TransportKind::Serial => Ok(Arc::new(serial::SerialPortOpener)),
        #[cfg(not(feature = "serial"))]
        TransportKind::Serial => Err(TransportError::Unsupported(
            "Serial ports require the 'serial' feature".to_string(),
        )),
        TransportKind::Mock => {
            tracing::info!("Using simulated multiplexer firmware");
            Ok(Arc::new(mock::MockLinkOpener::new(
                Arc::new(mock::MockMuxDevice::new()),
                &mock::MockConfig::default(),
            )))
        }
    }
}
