//! Multiplexer controller configuration
//!
//! Read from the `[arduino_uno_r4]` table of the hardware configuration file.
//! Every key is optional; missing keys take the defaults below.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the Arduino-based multiplexer controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArduinoConfig {
    /// Serial port path (e.g., "COM3", "/dev/ttyACM0")
    #[serde(default = "default_port")]
    pub port: String,
    /// Serial baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Per-read timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: f64,
    /// Device type label reported in status
    #[serde(default = "default_device_type")]
    pub device_type: String,
    /// Time the microcontroller needs to boot after the port opens
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Lowest selectable multiplexer position
    #[serde(default = "default_min_position")]
    pub min_position: i64,
    /// Highest selectable multiplexer position
    #[serde(default = "default_max_position")]
    pub max_position: i64,
    /// Which transport to open
    #[serde(default)]
    pub transport: TransportKind,
}

/// Transport selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Real serial port via tokio-serial
    #[default]
    Serial,
    /// In-process simulated firmware (no hardware needed)
    Mock,
}

/// Settings handed to a link opener
#[derive(Debug, Clone, PartialEq)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
    pub timeout: Duration,
}

fn default_port() -> String {
    "COM3".to_string()
}

fn default_baud_rate() -> u32 {
    115200
}

fn default_timeout() -> f64 {
    2.0
}

fn default_device_type() -> String {
    "Arduino Uno R4 Minima".to_string()
}

fn default_settle_ms() -> u64 {
    2000
}

fn default_min_position() -> i64 {
    1
}

fn default_max_position() -> i64 {
    8
}

impl Default for ArduinoConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            timeout: default_timeout(),
            device_type: default_device_type(),
            settle_ms: default_settle_ms(),
            min_position: default_min_position(),
            max_position: default_max_position(),
            transport: TransportKind::default(),
        }
    }
}

impl ArduinoConfig {
    /// Read timeout as a Duration; non-positive or non-finite values fall
    /// back to the default
    pub fn read_timeout(&self) -> Duration {
        if self.timeout.is_finite() && self.timeout > 0.0 {
            Duration::from_secs_f64(self.timeout)
        } else {
            Duration::from_secs_f64(default_timeout())
        }
    }

    pub fn settle_time(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn serial_settings(&self) -> SerialSettings {
        SerialSettings {
            port: self.port.clone(),
            baud_rate: self.baud_rate,
            timeout: self.read_timeout(),
        }
    }

    /// Whether `position` lies within the configured range
    pub fn contains_position(&self, position: i64) -> bool {
        (self.min_position..=self.max_position).contains(&position)
    }
}
