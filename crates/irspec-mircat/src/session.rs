//! Laser session
//!
//! Wraps one [`MircatSdk`] instance. Every operation takes the SDK behind an
//! async mutex, so a single operation runs at a time; long waits are
//! `poll_until` loops that can be cancelled through [`LaserSession::cancel_current`]
//! without touching that mutex.

use async_trait::async_trait;
use irspec_core::{
    poll_until, CancellationToken, ConnectionState, DeviceError, DeviceInfo, DeviceResult,
    DeviceSession,
};
use parking_lot::{Mutex as SyncMutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{BusyPolicy, MircatConfig};
use crate::scan::{ScanRequest, ScanSummary};
use crate::sdk::{
    create_sdk, ActualWavelength, ApiVersion, MircatSdk, ScanStatus, TunedWavelength,
    WavelengthUnits,
};

/// Body of a tune request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuneRequest {
    pub wavelength: f32,
    #[serde(default)]
    pub units: WavelengthUnits,
    #[serde(default = "default_qcl")]
    pub qcl: u8,
}

fn default_qcl() -> u8 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TuneResult {
    pub requested: TunedWavelength,
    pub actual: ActualWavelength,
}

/// Snapshot reported by `status()`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaserStatus {
    pub connected: bool,
    pub state: ConnectionState,
    /// An operation holds the SDK; the remaining fields are cached values
    pub busy: bool,
    pub api_version: Option<String>,
    pub qcls: u8,
    pub armed: bool,
    pub emitting: bool,
    pub tuned: Option<TunedWavelength>,
    pub actual_wavelength: Option<ActualWavelength>,
}

#[derive(Debug, Clone, Default)]
struct Snapshot {
    api_version: Option<ApiVersion>,
    qcls: u8,
    armed: bool,
    emitting: bool,
    tuned: Option<TunedWavelength>,
    actual: Option<ActualWavelength>,
}

/// Cancellation token of the running operation, cleared on drop
struct Operation<'a> {
    slot: &'a SyncMutex<Option<CancellationToken>>,
    token: CancellationToken,
}

impl Drop for Operation<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = None;
    }
}

fn logged<T>(operation: &'static str, result: DeviceResult<T>) -> DeviceResult<T> {
    match &result {
        Err(DeviceError::Cancelled) => info!(operation, "Laser operation cancelled"),
        Err(e) => error!(operation, error = %e, "Laser operation failed"),
        Ok(_) => {}
    }
    result
}

/// Session for a Daylight MIRcat laser
pub struct LaserSession {
    info: DeviceInfo,
    config: MircatConfig,
    sdk: Mutex<Box<dyn MircatSdk>>,
    state: RwLock<ConnectionState>,
    snapshot: RwLock<Snapshot>,
    current: SyncMutex<Option<CancellationToken>>,
}

impl LaserSession {
    pub fn new(config: MircatConfig, sdk: Box<dyn MircatSdk>) -> Self {
        let info = DeviceInfo {
            id: "daylight_mircat".to_string(),
            name: "MIRcat laser".to_string(),
            device_type: "Daylight MIRcat".to_string(),
            address: format!("{:?}", config.driver).to_lowercase(),
        };
        Self {
            info,
            config,
            sdk: Mutex::new(sdk),
            state: RwLock::new(ConnectionState::Disconnected),
            snapshot: RwLock::new(Snapshot::default()),
            current: SyncMutex::new(None),
        }
    }

    /// Create a session with the driver selected in `config`
    pub fn from_config(config: MircatConfig) -> DeviceResult<Self> {
        let sdk = create_sdk(&config)?;
        Ok(Self::new(config, sdk))
    }

    pub fn config(&self) -> &MircatConfig {
        &self.config
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    fn ensure_connected(&self) -> DeviceResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(DeviceError::NotConnected("MIRcat not connected".to_string()))
        }
    }

    fn begin(&self, cancel: &CancellationToken) -> Operation<'_> {
        let token = cancel.child_token();
        *self.current.lock() = Some(token.clone());
        Operation {
            slot: &self.current,
            token,
        }
    }

    /// Take the SDK for one operation
    ///
    /// Under [`BusyPolicy::Reject`] a running arm, tune, emission or scan
    /// fails the caller at once. Short holders such as a status refresh are
    /// still waited for.
    async fn acquire(&self) -> DeviceResult<MutexGuard<'_, Box<dyn MircatSdk>>> {
        if self.config.on_busy == BusyPolicy::Reject {
            if let Ok(guard) = self.sdk.try_lock() {
                return Ok(guard);
            }
            if self.current.lock().is_some() {
                return Err(DeviceError::Busy(
                    "another laser operation is running".to_string(),
                ));
            }
        }
        Ok(self.sdk.lock().await)
    }

    /// Cancel the running operation, if any. Returns whether one was running.
    pub fn cancel_current(&self) -> bool {
        match self.current.lock().as_ref() {
            Some(token) => {
                info!("Cancelling running laser operation");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Installed QCL count and both interlock checks
    fn check_ready(sdk: &mut dyn MircatSdk) -> DeviceResult<u8> {
        let qcls = sdk.num_installed_qcls()?;
        info!(qcls, "Installed QCLs");

        if !sdk.is_interlock_set()? {
            return Err(DeviceError::SafetyInterlock(
                "interlock status not set".to_string(),
            ));
        }
        if !sdk.is_key_switch_set()? {
            return Err(DeviceError::SafetyInterlock(
                "key switch status not set".to_string(),
            ));
        }
        Ok(qcls)
    }

    fn initialize(&self, sdk: &mut dyn MircatSdk) -> DeviceResult<()> {
        let version = sdk.api_version()?;
        info!(version = %version, "MIRcat SDK API version");

        sdk.initialize()?;
        match Self::check_ready(sdk) {
            Ok(qcls) => {
                let mut snapshot = self.snapshot.write();
                *snapshot = Snapshot {
                    api_version: Some(version),
                    qcls,
                    ..Snapshot::default()
                };
                Ok(())
            }
            Err(e) => {
                if let Err(de) = sdk.deinitialize() {
                    warn!(error = %de, "De-initialise after failed connect");
                }
                Err(e)
            }
        }
    }

    /// Arm the laser and wait for every QCL's TEC to reach set temperature
    pub async fn arm(&self, cancel: &CancellationToken) -> DeviceResult<()> {
        let mut guard = self.acquire().await?;
        let op = self.begin(cancel);
        logged("arm", self.arm_locked(&mut **guard, &op.token).await)
    }

    async fn arm_locked(
        &self,
        sdk: &mut dyn MircatSdk,
        cancel: &CancellationToken,
    ) -> DeviceResult<()> {
        self.ensure_connected()?;

        if !sdk.is_laser_armed()? {
            info!("Arming laser");
            sdk.arm_laser()?;
            poll_until(&self.config.arm_poll(), cancel, "laser armed", || {
                Ok(sdk.is_laser_armed()?.then_some(()))
            })
            .await?;
        }
        self.snapshot.write().armed = true;
        info!("Laser armed, waiting for TECs");

        let qcls = self.snapshot.read().qcls;
        poll_until(
            &self.config.tec_poll(),
            cancel,
            "TECs at set temperature",
            || {
                if sdk.are_tecs_at_set_temperature()? {
                    return Ok(Some(()));
                }
                for qcl in 1..=qcls {
                    let temperature = sdk.qcl_temperature(qcl)?;
                    let current = sdk.tec_current(qcl)?;
                    debug!(qcl, temperature_c = temperature, tec_current_ma = current, "TEC");
                }
                Ok(None)
            },
        )
        .await?;

        info!("TECs at set temperature");
        Ok(())
    }

    /// Disarm the laser, turning emission off first. Returns the armed flag
    /// read back afterwards.
    pub async fn disarm(&self) -> DeviceResult<bool> {
        let mut guard = self.acquire().await?;
        logged("disarm", self.disarm_locked(&mut **guard))
    }

    fn disarm_locked(&self, sdk: &mut dyn MircatSdk) -> DeviceResult<bool> {
        self.ensure_connected()?;

        if self.snapshot.read().emitting {
            sdk.emission_off()?;
        }
        sdk.disarm_laser()?;
        let armed = sdk.is_laser_armed()?;
        if armed {
            warn!("Laser still reports armed after disarm");
        } else {
            info!("Laser disarmed");
        }

        let mut snapshot = self.snapshot.write();
        snapshot.armed = armed;
        snapshot.emitting = false;
        snapshot.tuned = None;
        Ok(armed)
    }

    /// Tune one QCL and wait until the laser reports tuned
    pub async fn tune(
        &self,
        request: TuneRequest,
        cancel: &CancellationToken,
    ) -> DeviceResult<TuneResult> {
        let mut guard = self.acquire().await?;
        let op = self.begin(cancel);
        logged(
            "tune",
            self.tune_locked(&mut **guard, request, &op.token).await,
        )
    }

    async fn tune_locked(
        &self,
        sdk: &mut dyn MircatSdk,
        request: TuneRequest,
        cancel: &CancellationToken,
    ) -> DeviceResult<TuneResult> {
        self.ensure_connected()?;

        if !(request.wavelength.is_finite() && request.wavelength > 0.0) {
            return Err(DeviceError::InvalidRequest(format!(
                "invalid wavelength {}",
                request.wavelength
            )));
        }
        let qcls = self.snapshot.read().qcls;
        if request.qcl == 0 || request.qcl > qcls {
            return Err(DeviceError::InvalidRequest(format!(
                "QCL {} not installed (1..={})",
                request.qcl, qcls
            )));
        }

        sdk.tune_to_wavelength(request.wavelength, request.units, request.qcl)?;
        let requested = sdk.tuned_wavelength()?;
        info!(
            wavelength = requested.wavelength,
            units = ?requested.units,
            qcl = requested.qcl,
            "Tuning"
        );

        let actual = poll_until(
            &self.config.tune_poll(),
            cancel,
            "wavelength tuned",
            || {
                let tuned = sdk.is_tuned()?;
                let actual = sdk.actual_wavelength()?;
                debug!(actual = actual.wavelength, tuned, "Tuning");
                Ok(tuned.then_some(actual))
            },
        )
        .await?;

        info!(actual = actual.wavelength, "Tuned");
        let mut snapshot = self.snapshot.write();
        snapshot.tuned = Some(requested);
        snapshot.actual = Some(actual);
        Ok(TuneResult { requested, actual })
    }

    /// Turn emission on (waiting until the laser reports emitting) or off.
    /// Returns the emission flag read back afterwards.
    pub async fn set_emission(&self, on: bool, cancel: &CancellationToken) -> DeviceResult<bool> {
        let mut guard = self.acquire().await?;
        let op = self.begin(cancel);
        logged(
            "emission",
            self.set_emission_locked(&mut **guard, on, &op.token).await,
        )
    }

    async fn set_emission_locked(
        &self,
        sdk: &mut dyn MircatSdk,
        on: bool,
        cancel: &CancellationToken,
    ) -> DeviceResult<bool> {
        self.ensure_connected()?;

        let emitting = if on {
            sdk.emission_on()?;
            poll_until(&self.config.emission_poll(), cancel, "emission on", || {
                Ok(sdk.is_emission_on()?.then_some(()))
            })
            .await?;
            info!("Emission on");
            true
        } else {
            sdk.emission_off()?;
            let still_on = sdk.is_emission_on()?;
            if still_on {
                warn!("Laser still reports emission after turning it off");
            } else {
                info!("Emission off");
            }
            still_on
        };

        self.snapshot.write().emitting = emitting;
        Ok(emitting)
    }

    /// Run a scan to completion
    ///
    /// Manual tune mode is left first. When the wait is cancelled or times
    /// out the scan is stopped on the laser.
    pub async fn scan(
        &self,
        request: ScanRequest,
        cancel: &CancellationToken,
    ) -> DeviceResult<ScanSummary> {
        let mut guard = self.acquire().await?;
        let op = self.begin(cancel);
        logged(
            "scan",
            self.scan_locked(&mut **guard, &request, &op.token).await,
        )
    }

    async fn scan_locked(
        &self,
        sdk: &mut dyn MircatSdk,
        request: &ScanRequest,
        cancel: &CancellationToken,
    ) -> DeviceResult<ScanSummary> {
        self.ensure_connected()?;
        request.validate()?;

        if let Err(e) = sdk.cancel_manual_tune_mode() {
            warn!(error = %e, "Could not leave manual tune mode");
        }
        self.snapshot.write().tuned = None;

        match request {
            ScanRequest::Sweep(params) => sdk.start_sweep_scan(params)?,
            ScanRequest::StepMeasure(params) => sdk.start_step_measure_scan(params)?,
            ScanRequest::MultiSpectral {
                elements,
                num_scans,
            } => {
                let count = u8::try_from(elements.len()).map_err(|_| {
                    DeviceError::InvalidRequest("too many multi-spectral elements".to_string())
                })?;
                sdk.set_num_multi_spectral_elements(count)?;
                for element in elements {
                    sdk.add_multi_spectral_element(element)?;
                }
                sdk.start_multi_spectral_scan(*num_scans)?;
            }
        }

        let scan_id = Uuid::new_v4();
        let mode = request.mode();
        info!(%scan_id, mode, "Scan started");

        let mut polls: u64 = 0;
        let outcome = poll_until(
            &self.config.scan_poll(),
            cancel,
            "scan complete",
            || {
                let status: ScanStatus = sdk.scan_status()?;
                polls += 1;
                debug!(
                    scan = status.scan_number,
                    percent = status.percent,
                    wavelength = status.current_wavelength,
                    tec = status.tec_in_progress,
                    motion = status.motion_in_progress,
                    "Scan progress"
                );
                Ok((!status.in_progress).then_some(status))
            },
        )
        .await;

        let final_status = match outcome {
            Ok(status) => status,
            Err(e) => {
                if matches!(e, DeviceError::Cancelled | DeviceError::PollTimeout(_)) {
                    match sdk.stop_scan() {
                        Ok(()) => info!(%scan_id, "Scan stopped"),
                        Err(stop) => warn!(%scan_id, error = %stop, "Could not stop scan"),
                    }
                }
                return Err(e);
            }
        };

        info!(%scan_id, polls, "Scan complete");
        Ok(ScanSummary {
            scan_id,
            mode,
            polls,
            final_status,
        })
    }

    /// Current state. Cached values are reported while an operation runs.
    pub fn status(&self) -> LaserStatus {
        let busy = match self.sdk.try_lock() {
            Ok(mut guard) => {
                if self.is_connected() {
                    self.refresh(&mut **guard);
                }
                false
            }
            Err(_) => true,
        };

        let snapshot = self.snapshot.read().clone();
        LaserStatus {
            connected: self.is_connected(),
            state: self.state(),
            busy,
            api_version: snapshot.api_version.map(|v| v.to_string()),
            qcls: snapshot.qcls,
            armed: snapshot.armed,
            emitting: snapshot.emitting,
            tuned: snapshot.tuned,
            actual_wavelength: snapshot.actual,
        }
    }

    fn refresh(&self, sdk: &mut dyn MircatSdk) {
        let armed = sdk.is_laser_armed();
        let emitting = sdk.is_emission_on();
        let actual = sdk.actual_wavelength();

        let mut snapshot = self.snapshot.write();
        match armed {
            Ok(armed) => snapshot.armed = armed,
            Err(e) => warn!(error = %e, "Armed state unavailable for status"),
        }
        match emitting {
            Ok(emitting) => snapshot.emitting = emitting,
            Err(e) => warn!(error = %e, "Emission state unavailable for status"),
        }
        match actual {
            Ok(actual) => snapshot.actual = Some(actual),
            Err(e) => warn!(error = %e, "Wavelength unavailable for status"),
        }
    }
}

#[async_trait]
impl DeviceSession for LaserSession {
    fn device_info(&self) -> &DeviceInfo {
        &self.info
    }

    fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Initialise the SDK and verify the interlocks
    ///
    /// On a safety interlock failure the SDK is de-initialised and the
    /// configured [`InterlockPolicy`](crate::InterlockPolicy) applies.
    async fn connect(&self) -> DeviceResult<()> {
        let mut guard = self.acquire().await?;
        if self.is_connected() {
            debug!("MIRcat already connected");
            return Ok(());
        }

        self.set_state(ConnectionState::Connecting);
        match self.initialize(&mut **guard) {
            Ok(()) => {
                self.set_state(ConnectionState::Connected);
                info!("MIRcat connected");
                Ok(())
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                error!(error = %e, "MIRcat connect failed");
                Err(self.config.on_interlock_failure.enforce(e))
            }
        }
    }

    /// Emission off, disarm, de-initialise. Each step is best effort.
    async fn disconnect(&self) -> DeviceResult<()> {
        let mut guard = self.acquire().await?;
        if self.state() == ConnectionState::Disconnected {
            return Ok(());
        }
        let sdk: &mut dyn MircatSdk = &mut **guard;

        if let Err(e) = sdk.emission_off() {
            warn!(error = %e, "Emission off during disconnect");
        }
        if let Err(e) = sdk.disarm_laser() {
            warn!(error = %e, "Disarm during disconnect");
        }
        match sdk.is_laser_armed() {
            Ok(true) => warn!("Laser still armed at disconnect"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Armed state unavailable at disconnect"),
        }
        if let Err(e) = sdk.deinitialize() {
            warn!(error = %e, "De-initialise during disconnect");
        }

        *self.snapshot.write() = Snapshot::default();
        self.set_state(ConnectionState::Disconnected);
        info!("MIRcat disconnected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::safety::InterlockPolicy;
    use crate::sdk::simulated::{CallLog, SimulatedConfig, SimulatedMircat};
    use crate::sdk::SweepParams;

    fn config(simulation: SimulatedConfig) -> MircatConfig {
        MircatConfig {
            on_interlock_failure: InterlockPolicy::Error,
            max_wait_secs: 30,
            simulation,
            ..Default::default()
        }
    }

    fn session_with(simulation: SimulatedConfig) -> (LaserSession, CallLog) {
        let config = config(simulation);
        let sdk = SimulatedMircat::new(config.simulation.clone());
        let log = sdk.call_log();
        (LaserSession::new(config, Box::new(sdk)), log)
    }

    fn sweep() -> ScanRequest {
        ScanRequest::Sweep(SweepParams {
            start: 6.7,
            stop: 7.2,
            speed: 0.1,
            units: WavelengthUnits::Microns,
            num_scans: 1,
            bidirectional: false,
            qcl: 1,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_is_idempotent() {
        let (laser, log) = session_with(SimulatedConfig::default());
        laser.connect().await.unwrap();
        laser.connect().await.unwrap();

        assert!(laser.is_connected());
        let inits = log
            .lock()
            .iter()
            .filter(|c| **c == "MIRcatSDK_Initialize")
            .count();
        assert_eq!(inits, 1);

        let status = laser.status();
        assert_eq!(status.qcls, 4);
        assert_eq!(status.api_version.as_deref(), Some("2.5.0"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_switch_failure_deinitializes() {
        let (laser, log) = session_with(SimulatedConfig {
            key_switch_set: false,
            ..Default::default()
        });

        let err = laser.connect().await.unwrap_err();
        assert!(matches!(err, DeviceError::SafetyInterlock(_)));
        assert_eq!(laser.state(), ConnectionState::Disconnected);
        assert_eq!(log.lock().last(), Some(&"MIRcatSDK_DeInitialize"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_operations_require_connection() {
        let (laser, log) = session_with(SimulatedConfig::default());
        let cancel = CancellationToken::new();

        assert!(matches!(
            laser.arm(&cancel).await,
            Err(DeviceError::NotConnected(_))
        ));
        assert!(!laser.status().connected);
        assert!(log.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_procedure() {
        let (laser, log) = session_with(SimulatedConfig::default());
        let cancel = CancellationToken::new();

        laser.connect().await.unwrap();
        laser.arm(&cancel).await.unwrap();
        assert!(laser.status().armed);

        let tuned = laser
            .tune(
                TuneRequest {
                    wavelength: 7.0,
                    units: WavelengthUnits::Microns,
                    qcl: 1,
                },
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(tuned.requested.wavelength, 7.0);
        assert_eq!(tuned.actual.wavelength, 7.0);

        assert!(laser.set_emission(true, &cancel).await.unwrap());
        let summary = laser.scan(sweep(), &cancel).await.unwrap();
        assert_eq!(summary.mode, "sweep");
        assert!(!summary.final_status.in_progress);
        assert_eq!(summary.final_status.percent, 100);

        assert!(!laser.set_emission(false, &cancel).await.unwrap());
        assert!(!laser.disarm().await.unwrap());
        laser.disconnect().await.unwrap();
        assert!(!laser.is_connected());

        let calls = log.lock().clone();
        assert!(calls.contains(&"MIRcatSDK_CancelManualTuneMode"));
        assert!(calls.contains(&"MIRcatSDK_GetQCLTemperature"));
        assert_eq!(calls.last(), Some(&"MIRcatSDK_DeInitialize"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tune_rejects_missing_qcl() {
        let (laser, _) = session_with(SimulatedConfig {
            qcls: 2,
            ..Default::default()
        });
        let cancel = CancellationToken::new();
        laser.connect().await.unwrap();
        laser.arm(&cancel).await.unwrap();

        let result = laser
            .tune(
                TuneRequest {
                    wavelength: 7.0,
                    units: WavelengthUnits::Microns,
                    qcl: 3,
                },
                &cancel,
            )
            .await;
        assert!(matches!(result, Err(DeviceError::InvalidRequest(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_times_out() {
        let config = MircatConfig {
            max_wait_secs: 3,
            ..config(SimulatedConfig {
                arm_polls: u32::MAX,
                ..Default::default()
            })
        };
        let sdk = SimulatedMircat::new(config.simulation.clone());
        let laser = LaserSession::new(config, Box::new(sdk));
        laser.connect().await.unwrap();

        let result = laser.arm(&CancellationToken::new()).await;
        assert_eq!(
            result,
            Err(DeviceError::PollTimeout("laser armed".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_running_scan() {
        let (laser, log) = session_with(SimulatedConfig {
            scan_polls: u32::MAX,
            ..Default::default()
        });
        let laser = Arc::new(laser);
        let cancel = CancellationToken::new();
        laser.connect().await.unwrap();
        laser.arm(&cancel).await.unwrap();

        let running = {
            let laser = laser.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { laser.scan(sweep(), &cancel).await })
        };

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(laser.status().busy);
        assert!(laser.cancel_current());

        let result = running.await.unwrap();
        assert!(matches!(result, Err(DeviceError::Cancelled)));
        assert!(log.lock().contains(&"MIRcatSDK_StopScanInProgress"));
        assert!(!laser.cancel_current());
        assert!(!laser.status().busy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reject_while_busy() {
        let config = MircatConfig {
            on_busy: BusyPolicy::Reject,
            ..config(SimulatedConfig {
                scan_polls: u32::MAX,
                ..Default::default()
            })
        };
        let sdk = SimulatedMircat::new(config.simulation.clone());
        let laser = Arc::new(LaserSession::new(config, Box::new(sdk)));
        let cancel = CancellationToken::new();
        laser.connect().await.unwrap();
        laser.arm(&cancel).await.unwrap();

        let running = {
            let laser = laser.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { laser.scan(sweep(), &cancel).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;

        let tune = TuneRequest {
            wavelength: 7.0,
            units: WavelengthUnits::Microns,
            qcl: 1,
        };
        let err = laser.tune(tune, &cancel).await.unwrap_err();
        assert!(matches!(err, DeviceError::Busy(_)));
        assert_eq!(err.status_code(), 409);
        assert!(matches!(laser.disarm().await, Err(DeviceError::Busy(_))));

        assert!(laser.cancel_current());
        assert!(matches!(running.await.unwrap(), Err(DeviceError::Cancelled)));
        laser.tune(tune, &cancel).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_queues_behind_running_operation() {
        let (laser, _) = session_with(SimulatedConfig::default());
        let laser = Arc::new(laser);
        let cancel = CancellationToken::new();
        laser.connect().await.unwrap();
        laser.arm(&cancel).await.unwrap();

        let running = {
            let laser = laser.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { laser.scan(sweep(), &cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(laser.status().busy);

        // Runs once the scan has finished instead of failing
        assert!(!laser.disarm().await.unwrap());
        assert!(running.await.unwrap().is_ok());
    }
}
