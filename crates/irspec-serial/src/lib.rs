//! irspec-serial - Serial multiplexer controller session
//!
//! Drives the sample multiplexer through an Arduino Uno R4 Minima speaking a
//! line-oriented ASCII protocol over a serial port.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              MuxController               │
//! │  implements DeviceSession                │
//! │                                          │
//! │  ┌──────────────┐   ┌─────────────────┐  │
//! │  │ ArduinoConfig│   │ protocol        │  │
//! │  │ (port, baud) │   │ (PING/MUX/...)  │  │
//! │  └──────────────┘   └─────────────────┘  │
//! │            │                             │
//! │   Mutex<Option<Box<dyn SerialLink>>>     │
//! │            │                             │
//! │   ┌────────┴─────────┐                   │
//! │   │ LinkOpener       │                   │
//! │   │ (serial / mock)  │                   │
//! │   └──────────────────┘                   │
//! └──────────────────────────────────────────┘
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod protocol;
pub mod transport;

pub use config::{ArduinoConfig, SerialSettings, TransportKind};
pub use controller::{MuxController, MuxStatus, PositionRange};
pub use error::TransportError;
pub use transport::{create_opener, LinkOpener, SerialLink};

// Re-export for convenience
pub use irspec_core::{ConnectionState, DeviceError, DeviceResult, DeviceSession};
