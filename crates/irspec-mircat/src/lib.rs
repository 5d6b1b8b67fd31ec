//! irspec-mircat - Daylight MIRcat laser session
//!
//! Drives a tunable quantum-cascade laser through the vendor SDK: interlock
//! checks, arming with TEC stabilisation, tuning, emission control and the
//! three scan modes. Everything that waits on the laser is a bounded,
//! cancellable poll.
//!
//! The SDK sits behind the [`MircatSdk`] trait. A simulated laser is always
//! available; the native binding needs the `native-sdk` feature.

pub mod config;
pub mod safety;
pub mod scan;
pub mod sdk;
pub mod sequence;
pub mod session;

pub use config::{BusyPolicy, DriverKind, MircatConfig};
pub use safety::{InterlockPolicy, INTERLOCK_EXIT_CODE};
pub use scan::{ScanRequest, ScanSummary};
pub use sdk::{create_sdk, MircatSdk, SdkError, SdkResult, WavelengthUnits};
pub use sequence::{run_sequence, SequencePlan, SequenceReport, SequenceStep};
pub use session::{LaserSession, LaserStatus, TuneRequest, TuneResult};

pub use irspec_core::{CancellationToken, ConnectionState, DeviceError, DeviceResult, DeviceSession};
