//! irspec-core - Core traits and types for device sessions
//!
//! This crate provides the abstractions shared by every hardware module
//! (serial multiplexer controller, SDK-driven laser, ...) so the HTTP layer
//! can treat them uniformly.

pub mod error;
pub mod poll;
pub mod result;
pub mod session;

pub use error::{DeviceError, DeviceResult};
pub use poll::{poll_until, PollPolicy};
pub use result::CommandResult;
pub use session::{ConnectionState, DeviceInfo, DeviceSession};

// Re-export so downstream crates share one token type
pub use tokio_util::sync::CancellationToken;
