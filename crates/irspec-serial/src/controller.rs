//! Multiplexer controller session
//!
//! Owns the single serial connection to the controller and turns position
//! requests into command/reply exchanges. The connection sits behind an
//! async mutex: each exchange runs while holding it, so concurrent HTTP
//! requests are serialised and never interleave bytes on the wire.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use irspec_core::{ConnectionState, DeviceError, DeviceInfo, DeviceResult, DeviceSession};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::ArduinoConfig;
use crate::protocol::{self, MuxCommand};
use crate::transport::{create_opener, LinkOpener, SerialLink, TransportError};

/// Snapshot reported by `status()`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MuxStatus {
    pub connected: bool,
    pub port: String,
    pub device_type: String,
    /// Only queried while connected; `None` when disconnected or the query failed
    pub current_position: Option<i64>,
}

/// Selectable multiplexer positions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionRange {
    pub positions: Vec<i64>,
    pub min_position: i64,
    pub max_position: i64,
}

/// Session for the Arduino-based multiplexer controller
pub struct MuxController {
    info: DeviceInfo,
    config: ArduinoConfig,
    opener: Arc<dyn LinkOpener>,
    link: Mutex<Option<Box<dyn SerialLink>>>,
    state: RwLock<ConnectionState>,
}

impl MuxController {
    pub fn new(config: ArduinoConfig, opener: Arc<dyn LinkOpener>) -> Self {
        let info = DeviceInfo {
            id: "arduino_uno_r4".to_string(),
            name: "Multiplexer controller".to_string(),
            device_type: config.device_type.clone(),
            address: config.port.clone(),
        };
        Self {
            info,
            config,
            opener,
            link: Mutex::new(None),
            state: RwLock::new(ConnectionState::Disconnected),
        }
    }

    /// Create a controller with the transport selected in `config`
    pub fn from_config(config: ArduinoConfig) -> Result<Self, TransportError> {
        let opener = create_opener(&config)?;
        Ok(Self::new(config, opener))
    }

    pub fn config(&self) -> &ArduinoConfig {
        &self.config
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    fn not_connected() -> DeviceError {
        DeviceError::NotConnected("Arduino not connected".to_string())
    }

    /// Write one command and read its reply
    ///
    /// Stale input is dropped first so a reply that missed an earlier
    /// timeout cannot be taken for this command's.
    async fn exchange(
        link: &mut dyn SerialLink,
        command: &MuxCommand,
        timeout: Duration,
    ) -> DeviceResult<String> {
        let line = command.to_line();
        link.clear_input().await?;
        link.write_line(&line).await?;
        let reply = link.read_line(timeout).await?;
        debug!(endpoint = link.endpoint(), command = %line, reply = %reply, "Exchange");
        Ok(reply)
    }

    async fn probe(link: &mut dyn SerialLink, timeout: Duration) -> DeviceResult<()> {
        let reply = Self::exchange(link, &MuxCommand::Ping, timeout).await?;
        protocol::check_probe_reply(&reply)
    }

    async fn query_position(link: &mut dyn SerialLink, timeout: Duration) -> DeviceResult<i64> {
        let reply = Self::exchange(link, &MuxCommand::QueryPosition, timeout).await?;
        protocol::parse_position_reply(&reply)
    }

    /// Move the multiplexer to `position`
    ///
    /// The controller must echo `MUX_SET <position>` exactly. A single
    /// attempt is made; there is no retry.
    pub async fn set_position(&self, position: i64) -> DeviceResult<()> {
        let mut guard = self.link.lock().await;
        let link = guard.as_mut().ok_or_else(|| {
            error!("Arduino not connected");
            Self::not_connected()
        })?;

        let reply = Self::exchange(
            link.as_mut(),
            &MuxCommand::SetPosition(position),
            self.config.read_timeout(),
        )
        .await
        .map_err(|e| {
            error!(position, error = %e, "Failed to set MUX position");
            e
        })?;

        protocol::check_set_reply(position, &reply).map_err(|e| {
            error!(position, %reply, "Unexpected response");
            e
        })?;

        info!(position, "MUX position set");
        Ok(())
    }

    /// Query the current multiplexer position
    pub async fn get_position(&self) -> DeviceResult<i64> {
        let mut guard = self.link.lock().await;
        let link = guard.as_mut().ok_or_else(|| {
            error!("Arduino not connected");
            Self::not_connected()
        })?;

        Self::query_position(link.as_mut(), self.config.read_timeout())
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to get MUX position");
                e
            })
    }

    /// Connection flag, configuration labels and, when connected, the
    /// current position
    pub async fn status(&self) -> MuxStatus {
        let mut guard = self.link.lock().await;
        let current_position = match guard.as_mut() {
            Some(link) => {
                match Self::query_position(link.as_mut(), self.config.read_timeout()).await {
                    Ok(position) => Some(position),
                    Err(e) => {
                        warn!(error = %e, "Position unavailable for status");
                        None
                    }
                }
            }
            None => None,
        };

        MuxStatus {
            connected: guard.is_some() && self.is_connected(),
            port: self.config.port.clone(),
            device_type: self.config.device_type.clone(),
            current_position,
        }
    }

    /// Positions selectable with the configured range
    pub fn available_positions(&self) -> PositionRange {
        let min_position = self.config.min_position;
        let max_position = self.config.max_position.max(min_position);
        PositionRange {
            positions: (min_position..=max_position).collect(),
            min_position,
            max_position,
        }
    }
}

#[async_trait]
impl DeviceSession for MuxController {
    fn device_info(&self) -> &DeviceInfo {
        &self.info
    }

    fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    async fn connect(&self) -> DeviceResult<()> {
        let mut guard = self.link.lock().await;

        if guard.is_some() && self.is_connected() {
            debug!(port = %self.config.port, "Already connected, reusing handle");
            return Ok(());
        }

        // A handle without Connected state is stale; release it first
        if let Some(mut stale) = guard.take() {
            if let Err(e) = stale.close().await {
                warn!(error = %e, "Failed to close stale handle");
            }
        }

        self.set_state(ConnectionState::Connecting);
        let settings = self.config.serial_settings();

        let mut link = match self.opener.open(&settings).await {
            Ok(link) => link,
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                error!(port = %settings.port, error = %e, "Failed to connect to Arduino");
                return Err(e.into());
            }
        };

        let settle = self.config.settle_time();
        if !settle.is_zero() {
            debug!(?settle, "Waiting for controller boot");
            tokio::time::sleep(settle).await;
        }

        match Self::probe(link.as_mut(), settings.timeout).await {
            Ok(()) => {
                *guard = Some(link);
                self.set_state(ConnectionState::Connected);
                info!(port = %settings.port, "Successfully connected to Arduino");
                Ok(())
            }
            Err(e) => {
                if let Err(close_err) = link.close().await {
                    warn!(error = %close_err, "Failed to close handle after probe failure");
                }
                self.set_state(ConnectionState::Disconnected);
                error!(port = %settings.port, error = %e, "Connection test failed");
                Err(e)
            }
        }
    }

    async fn disconnect(&self) -> DeviceResult<()> {
        let mut guard = self.link.lock().await;
        if let Some(mut link) = guard.take() {
            if let Err(e) = link.close().await {
                warn!(error = %e, "Error while closing serial port");
            }
        }
        self.set_state(ConnectionState::Disconnected);
        info!("Disconnected from Arduino");
        Ok(())
    }
}
