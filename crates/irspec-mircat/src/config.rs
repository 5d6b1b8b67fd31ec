//! `[daylight_mircat]` configuration section

use std::time::Duration;

use irspec_core::PollPolicy;
use serde::Deserialize;

use crate::safety::InterlockPolicy;
use crate::sdk::simulated::SimulatedConfig;

/// Which SDK implementation backs the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    #[default]
    Simulated,
    Native,
}

/// What an operation does when another one holds the laser
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusyPolicy {
    /// Queue behind the running operation
    #[default]
    Wait,
    /// Fail at once with `DeviceError::Busy`
    Reject,
}

/// Laser session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MircatConfig {
    #[serde(default)]
    pub driver: DriverKind,

    /// Upper bound for any single polling loop
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,

    #[serde(default)]
    pub on_interlock_failure: InterlockPolicy,

    #[serde(default)]
    pub on_busy: BusyPolicy,

    #[serde(default = "default_arm_poll_ms")]
    pub arm_poll_ms: u64,

    #[serde(default = "default_tec_poll_ms")]
    pub tec_poll_ms: u64,

    #[serde(default = "default_tune_poll_ms")]
    pub tune_poll_ms: u64,

    #[serde(default = "default_emission_poll_ms")]
    pub emission_poll_ms: u64,

    #[serde(default = "default_scan_poll_ms")]
    pub scan_poll_ms: u64,

    /// Laser model used by the simulated driver
    #[serde(default)]
    pub simulation: SimulatedConfig,
}

fn default_max_wait_secs() -> u64 {
    600
}

fn default_arm_poll_ms() -> u64 {
    1000
}

fn default_tec_poll_ms() -> u64 {
    100
}

fn default_tune_poll_ms() -> u64 {
    50
}

fn default_emission_poll_ms() -> u64 {
    500
}

fn default_scan_poll_ms() -> u64 {
    300
}

impl Default for MircatConfig {
    fn default() -> Self {
        Self {
            driver: DriverKind::default(),
            max_wait_secs: default_max_wait_secs(),
            on_interlock_failure: InterlockPolicy::default(),
            on_busy: BusyPolicy::default(),
            arm_poll_ms: default_arm_poll_ms(),
            tec_poll_ms: default_tec_poll_ms(),
            tune_poll_ms: default_tune_poll_ms(),
            emission_poll_ms: default_emission_poll_ms(),
            scan_poll_ms: default_scan_poll_ms(),
            simulation: SimulatedConfig::default(),
        }
    }
}

impl MircatConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    pub fn arm_poll(&self) -> PollPolicy {
        PollPolicy::from_millis(self.arm_poll_ms, self.max_wait())
    }

    pub fn tec_poll(&self) -> PollPolicy {
        PollPolicy::from_millis(self.tec_poll_ms, self.max_wait())
    }

    pub fn tune_poll(&self) -> PollPolicy {
        PollPolicy::from_millis(self.tune_poll_ms, self.max_wait())
    }

    pub fn emission_poll(&self) -> PollPolicy {
        PollPolicy::from_millis(self.emission_poll_ms, self.max_wait())
    }

    pub fn scan_poll(&self) -> PollPolicy {
        PollPolicy::from_millis(self.scan_poll_ms, self.max_wait())
    }
}
