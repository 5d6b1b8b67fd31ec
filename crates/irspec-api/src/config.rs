//! Hardware configuration file
//!
//! One TOML document with a `[server]` section and one section per hardware
//! module. Every field has a default, so a missing or broken file still
//! yields a usable configuration.

use std::path::{Path, PathBuf};

use irspec_mircat::MircatConfig;
use irspec_serial::ArduinoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Default location of the hardware configuration file
pub const DEFAULT_CONFIG_PATH: &str = "hardware_configuration.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// `[server]` section
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Root scanned for hardware modules
    #[serde(default = "default_modules_dir")]
    pub modules_dir: PathBuf,

    /// Built frontend served for non-API paths
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_modules_dir() -> PathBuf {
    PathBuf::from("modules")
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            modules_dir: default_modules_dir(),
            static_dir: default_static_dir(),
        }
    }
}

/// The whole hardware configuration document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HardwareConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub arduino_uno_r4: ArduinoConfig,

    #[serde(default)]
    pub daylight_mircat: MircatConfig,
}

impl HardwareConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path`, falling back to defaults when it is missing or invalid
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "Loaded hardware configuration");
                config
            }
            Err(e) => {
                tracing::error!(error = %e, "Hardware configuration unavailable, using defaults");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use irspec_serial::TransportKind;

    #[test]
    fn test_defaults() {
        let config = HardwareConfig::from_toml_str("").unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.arduino_uno_r4.port, "COM3");
        assert_eq!(config.arduino_uno_r4.baud_rate, 115200);
        assert_eq!(config.daylight_mircat.scan_poll_ms, 300);
    }

    #[test]
    fn test_sections() {
        let config = HardwareConfig::from_toml_str(
            r#"
            [server]
            port = 9000

            [arduino_uno_r4]
            port = "/dev/ttyACM0"
            timeout = 0.5
            transport = "mock"

            [daylight_mircat]
            on_interlock_failure = "error"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.modules_dir, PathBuf::from("modules"));
        assert_eq!(config.arduino_uno_r4.port, "/dev/ttyACM0");
        assert_eq!(config.arduino_uno_r4.transport, TransportKind::Mock);
        assert_eq!(config.arduino_uno_r4.device_type, "Arduino Uno R4 Minima");
    }

    #[test]
    fn test_shipped_configuration() {
        let config =
            HardwareConfig::from_toml_str(include_str!("../../../hardware_configuration.toml"))
                .unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.arduino_uno_r4.transport, TransportKind::Serial);
        assert_eq!(config.arduino_uno_r4.settle_ms, 2000);
        assert_eq!(config.daylight_mircat.simulation.qcls, 4);
        assert_eq!(config.daylight_mircat.on_busy, irspec_mircat::BusyPolicy::Wait);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = HardwareConfig::load_or_default(&dir.path().join("absent.toml"));
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_broken_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hardware_configuration.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();

        assert!(matches!(
            HardwareConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert_eq!(HardwareConfig::load_or_default(&path).server.port, 8000);
    }
}
