//! In-process MIRcat laser model
//!
//! Long-running operations complete after a configurable number of status
//! polls, so callers exercise the same poll loops they run against hardware.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;

use super::{
    ActualWavelength, ApiVersion, MircatSdk, MultiSpectralElement, ScanStatus, SdkError,
    SdkResult, StepMeasureParams, SweepParams, TunedWavelength, WavelengthUnits,
};

// Result codes the model reports. Values sit above the vendor's own range.
pub const SIM_NOT_INITIALIZED: u32 = 101;
pub const SIM_INTERLOCK_OPEN: u32 = 102;
pub const SIM_NOT_ARMED: u32 = 103;
pub const SIM_TECS_NOT_READY: u32 = 104;
pub const SIM_BAD_QCL: u32 = 105;
pub const SIM_NOT_TUNED: u32 = 106;
pub const SIM_BAD_SCAN: u32 = 107;
pub const SIM_SCAN_BUSY: u32 = 108;

/// Tunables for the simulated laser
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulatedConfig {
    pub qcls: u8,
    pub interlock_set: bool,
    pub key_switch_set: bool,
    /// Status polls before an arm request takes effect
    pub arm_polls: u32,
    /// Status polls before the TECs report at temperature
    pub tec_polls: u32,
    pub tune_polls: u32,
    pub emission_polls: u32,
    /// Status polls per scan pass
    pub scan_polls: u32,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            qcls: 4,
            interlock_set: true,
            key_switch_set: true,
            arm_polls: 2,
            tec_polls: 3,
            tune_polls: 2,
            emission_polls: 1,
            scan_polls: 5,
        }
    }
}

/// Names of the calls made against the model, in order
pub type CallLog = Arc<Mutex<Vec<&'static str>>>;

struct ScanRun {
    start: f32,
    stop: f32,
    units: WavelengthUnits,
    passes: u16,
    polls_per_pass: u32,
    polled: u32,
}

impl ScanRun {
    fn total_polls(&self) -> u32 {
        self.polls_per_pass.max(1) * u32::from(self.passes.max(1))
    }

    fn status(&self) -> ScanStatus {
        let total = self.total_polls();
        let done = self.polled.min(total);
        let in_progress = done < total;
        let per_pass = self.polls_per_pass.max(1);
        let pass_progress = (done % per_pass) as f32 / per_pass as f32;
        ScanStatus {
            in_progress,
            active: in_progress,
            paused: false,
            scan_number: (done / per_pass).min(u32::from(self.passes)) as u16 + u16::from(in_progress),
            percent: (u64::from(done) * 100 / u64::from(total)) as u16,
            current_wavelength: if in_progress {
                self.start + (self.stop - self.start) * pass_progress
            } else {
                self.stop
            },
            units: self.units,
            tec_in_progress: false,
            motion_in_progress: in_progress,
        }
    }
}

/// Simulated MIRcat controller
pub struct SimulatedMircat {
    config: SimulatedConfig,
    calls: CallLog,
    initialized: bool,
    armed: bool,
    arm_pending: Option<u32>,
    tec_pending: u32,
    tune: Option<TunedWavelength>,
    tune_pending: u32,
    emitting: bool,
    emission_pending: Option<u32>,
    multi_spectral: Vec<MultiSpectralElement>,
    multi_spectral_capacity: u8,
    scan: Option<ScanRun>,
}

impl SimulatedMircat {
    pub fn new(config: SimulatedConfig) -> Self {
        Self {
            config,
            calls: Arc::new(Mutex::new(Vec::new())),
            initialized: false,
            armed: false,
            arm_pending: None,
            tec_pending: 0,
            tune: None,
            tune_pending: 0,
            emitting: false,
            emission_pending: None,
            multi_spectral: Vec::new(),
            multi_spectral_capacity: 0,
            scan: None,
        }
    }

    /// Shared handle to the call log, readable after the model is boxed
    pub fn call_log(&self) -> CallLog {
        self.calls.clone()
    }

    fn enter(&mut self, call: &'static str) -> SdkResult<()> {
        self.calls.lock().push(call);
        if self.initialized {
            Ok(())
        } else {
            Err(SdkError {
                call,
                code: SIM_NOT_INITIALIZED,
            })
        }
    }

    fn require_armed(&self, call: &'static str) -> SdkResult<()> {
        if !self.armed {
            return Err(SdkError {
                call,
                code: SIM_NOT_ARMED,
            });
        }
        if self.tec_pending > 0 {
            return Err(SdkError {
                call,
                code: SIM_TECS_NOT_READY,
            });
        }
        Ok(())
    }

    fn require_qcl(&self, call: &'static str, qcl: u8) -> SdkResult<()> {
        if qcl == 0 || qcl > self.config.qcls {
            Err(SdkError {
                call,
                code: SIM_BAD_QCL,
            })
        } else {
            Ok(())
        }
    }

    fn require_idle(&self, call: &'static str) -> SdkResult<()> {
        match &self.scan {
            Some(run) if run.status().in_progress => Err(SdkError {
                call,
                code: SIM_SCAN_BUSY,
            }),
            _ => Ok(()),
        }
    }

    fn begin_scan(&mut self, start: f32, stop: f32, units: WavelengthUnits, passes: u16) {
        self.scan = Some(ScanRun {
            start,
            stop,
            units,
            passes,
            polls_per_pass: self.config.scan_polls,
            polled: 0,
        });
    }

    fn reset(&mut self) {
        self.armed = false;
        self.arm_pending = None;
        self.tec_pending = 0;
        self.tune = None;
        self.tune_pending = 0;
        self.emitting = false;
        self.emission_pending = None;
        self.multi_spectral.clear();
        self.multi_spectral_capacity = 0;
        self.scan = None;
    }
}

fn valid_range(start: f32, stop: f32) -> bool {
    start.is_finite() && stop.is_finite() && start > 0.0 && stop > 0.0 && start != stop
}

impl MircatSdk for SimulatedMircat {
    fn api_version(&mut self) -> SdkResult<ApiVersion> {
        self.calls.lock().push("MIRcatSDK_GetAPIVersion");
        Ok(ApiVersion {
            major: 2,
            minor: 5,
            patch: 0,
        })
    }

    fn initialize(&mut self) -> SdkResult<()> {
        self.calls.lock().push("MIRcatSDK_Initialize");
        self.initialized = true;
        Ok(())
    }

    fn deinitialize(&mut self) -> SdkResult<()> {
        self.enter("MIRcatSDK_DeInitialize")?;
        self.reset();
        self.initialized = false;
        Ok(())
    }

    fn num_installed_qcls(&mut self) -> SdkResult<u8> {
        self.enter("MIRcatSDK_GetNumInstalledQcls")?;
        Ok(self.config.qcls)
    }

    fn is_interlock_set(&mut self) -> SdkResult<bool> {
        self.enter("MIRcatSDK_IsInterlockedStatusSet")?;
        Ok(self.config.interlock_set)
    }

    fn is_key_switch_set(&mut self) -> SdkResult<bool> {
        self.enter("MIRcatSDK_IsKeySwitchStatusSet")?;
        Ok(self.config.key_switch_set)
    }

    fn is_laser_armed(&mut self) -> SdkResult<bool> {
        self.enter("MIRcatSDK_IsLaserArmed")?;
        if let Some(remaining) = self.arm_pending {
            if remaining == 0 {
                self.arm_pending = None;
                self.armed = true;
                self.tec_pending = self.config.tec_polls;
            } else {
                self.arm_pending = Some(remaining - 1);
            }
        }
        Ok(self.armed)
    }

    fn arm_laser(&mut self) -> SdkResult<()> {
        let call = "MIRcatSDK_ArmDisarmLaser";
        self.enter(call)?;
        if !self.config.interlock_set || !self.config.key_switch_set {
            return Err(SdkError {
                call,
                code: SIM_INTERLOCK_OPEN,
            });
        }
        if !self.armed && self.arm_pending.is_none() {
            self.arm_pending = Some(self.config.arm_polls);
        }
        Ok(())
    }

    fn disarm_laser(&mut self) -> SdkResult<()> {
        self.enter("MIRcatSDK_DisarmLaser")?;
        let initialized = self.initialized;
        self.reset();
        self.initialized = initialized;
        Ok(())
    }

    fn are_tecs_at_set_temperature(&mut self) -> SdkResult<bool> {
        let call = "MIRcatSDK_AreTECsAtSetTemperature";
        self.enter(call)?;
        if !self.armed {
            return Err(SdkError {
                call,
                code: SIM_NOT_ARMED,
            });
        }
        if self.tec_pending > 0 {
            self.tec_pending -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    fn qcl_temperature(&mut self, qcl: u8) -> SdkResult<f32> {
        let call = "MIRcatSDK_GetQCLTemperature";
        self.enter(call)?;
        self.require_qcl(call, qcl)?;
        Ok(17.0 + self.tec_pending as f32 * 0.5)
    }

    fn tec_current(&mut self, qcl: u8) -> SdkResult<u16> {
        let call = "MIRcatSDK_GetTecCurrent";
        self.enter(call)?;
        self.require_qcl(call, qcl)?;
        Ok(if self.tec_pending > 0 { 1200 } else { 400 })
    }

    fn tune_to_wavelength(
        &mut self,
        wavelength: f32,
        units: WavelengthUnits,
        qcl: u8,
    ) -> SdkResult<()> {
        let call = "MIRcatSDK_TuneToWW";
        self.enter(call)?;
        self.require_armed(call)?;
        self.require_qcl(call, qcl)?;
        self.require_idle(call)?;
        self.tune = Some(TunedWavelength {
            wavelength,
            units,
            qcl,
        });
        self.tune_pending = self.config.tune_polls;
        Ok(())
    }

    fn tuned_wavelength(&mut self) -> SdkResult<TunedWavelength> {
        let call = "MIRcatSDK_GetTuneWW";
        self.enter(call)?;
        self.tune.ok_or(SdkError {
            call,
            code: SIM_NOT_TUNED,
        })
    }

    fn is_tuned(&mut self) -> SdkResult<bool> {
        self.enter("MIRcatSDK_IsTuned")?;
        if self.tune.is_none() {
            return Ok(false);
        }
        if self.tune_pending > 0 {
            self.tune_pending -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    fn actual_wavelength(&mut self) -> SdkResult<ActualWavelength> {
        self.enter("MIRcatSDK_GetActualWW")?;
        if let Some(run) = &self.scan {
            let status = run.status();
            if status.in_progress {
                return Ok(ActualWavelength {
                    wavelength: status.current_wavelength,
                    units: status.units,
                    light_valid: self.emitting,
                });
            }
        }
        Ok(match self.tune {
            Some(tune) => ActualWavelength {
                wavelength: tune.wavelength,
                units: tune.units,
                light_valid: self.emitting && self.tune_pending == 0,
            },
            None => ActualWavelength {
                wavelength: 0.0,
                units: WavelengthUnits::Microns,
                light_valid: false,
            },
        })
    }

    fn cancel_manual_tune_mode(&mut self) -> SdkResult<()> {
        self.enter("MIRcatSDK_CancelManualTuneMode")?;
        self.tune = None;
        self.tune_pending = 0;
        Ok(())
    }

    fn emission_on(&mut self) -> SdkResult<()> {
        let call = "MIRcatSDK_TurnEmissionOn";
        self.enter(call)?;
        self.require_armed(call)?;
        if !self.emitting && self.emission_pending.is_none() {
            self.emission_pending = Some(self.config.emission_polls);
        }
        Ok(())
    }

    fn emission_off(&mut self) -> SdkResult<()> {
        self.enter("MIRcatSDK_TurnEmissionOff")?;
        self.emitting = false;
        self.emission_pending = None;
        Ok(())
    }

    fn is_emission_on(&mut self) -> SdkResult<bool> {
        self.enter("MIRcatSDK_IsEmissionOn")?;
        if let Some(remaining) = self.emission_pending {
            if remaining == 0 {
                self.emission_pending = None;
                self.emitting = true;
            } else {
                self.emission_pending = Some(remaining - 1);
            }
        }
        Ok(self.emitting)
    }

    fn start_sweep_scan(&mut self, params: &SweepParams) -> SdkResult<()> {
        let call = "MIRcatSDK_StartSweepScan";
        self.enter(call)?;
        self.require_armed(call)?;
        self.require_qcl(call, params.qcl)?;
        self.require_idle(call)?;
        if !valid_range(params.start, params.stop) || params.speed <= 0.0 {
            return Err(SdkError {
                call,
                code: SIM_BAD_SCAN,
            });
        }
        self.begin_scan(params.start, params.stop, params.units, params.num_scans);
        Ok(())
    }

    fn start_step_measure_scan(&mut self, params: &StepMeasureParams) -> SdkResult<()> {
        let call = "MIRcatSDK_StartStepMeasureModeScan";
        self.enter(call)?;
        self.require_armed(call)?;
        self.require_idle(call)?;
        if !valid_range(params.start, params.stop) || params.step <= 0.0 {
            return Err(SdkError {
                call,
                code: SIM_BAD_SCAN,
            });
        }
        self.begin_scan(
            params.start,
            params.stop,
            params.units,
            u16::from(params.num_scans),
        );
        Ok(())
    }

    fn set_num_multi_spectral_elements(&mut self, count: u8) -> SdkResult<()> {
        self.enter("MIRcatSDK_SetNumMultiSpectralElements")?;
        self.multi_spectral.clear();
        self.multi_spectral_capacity = count;
        Ok(())
    }

    fn add_multi_spectral_element(&mut self, element: &MultiSpectralElement) -> SdkResult<()> {
        let call = "MIRcatSDK_AddMultiSpectralElement";
        self.enter(call)?;
        if self.multi_spectral.len() >= usize::from(self.multi_spectral_capacity) {
            return Err(SdkError {
                call,
                code: SIM_BAD_SCAN,
            });
        }
        self.multi_spectral.push(*element);
        Ok(())
    }

    fn start_multi_spectral_scan(&mut self, num_scans: u16) -> SdkResult<()> {
        let call = "MIRcatSDK_StartMultiSpectralModeScan";
        self.enter(call)?;
        self.require_armed(call)?;
        self.require_idle(call)?;
        let (first, last) = match (self.multi_spectral.first(), self.multi_spectral.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => {
                return Err(SdkError {
                    call,
                    code: SIM_BAD_SCAN,
                })
            }
        };
        self.begin_scan(first.wavelength, last.wavelength, first.units, num_scans);
        Ok(())
    }

    fn scan_status(&mut self) -> SdkResult<ScanStatus> {
        self.enter("MIRcatSDK_GetScanStatus")?;
        match self.scan.as_mut() {
            Some(run) => {
                run.polled = run.polled.saturating_add(1);
                Ok(run.status())
            }
            None => Ok(ScanStatus::default()),
        }
    }

    fn stop_scan(&mut self) -> SdkResult<()> {
        self.enter("MIRcatSDK_StopScanInProgress")?;
        self.scan = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_model() -> SimulatedMircat {
        let mut sdk = SimulatedMircat::new(SimulatedConfig {
            arm_polls: 1,
            tec_polls: 1,
            ..Default::default()
        });
        sdk.initialize().unwrap();
        sdk
    }

    fn arm(sdk: &mut SimulatedMircat) {
        sdk.arm_laser().unwrap();
        while !sdk.is_laser_armed().unwrap() {}
        while !sdk.are_tecs_at_set_temperature().unwrap() {}
    }

    #[test]
    fn test_calls_require_initialize() {
        let mut sdk = SimulatedMircat::new(SimulatedConfig::default());
        let err = sdk.num_installed_qcls().unwrap_err();
        assert_eq!(err.code, SIM_NOT_INITIALIZED);
        assert_eq!(err.call, "MIRcatSDK_GetNumInstalledQcls");
    }

    #[test]
    fn test_arming_takes_polls() {
        let mut sdk = ready_model();
        sdk.arm_laser().unwrap();
        assert!(!sdk.is_laser_armed().unwrap());
        assert!(sdk.is_laser_armed().unwrap());
        assert!(!sdk.are_tecs_at_set_temperature().unwrap());
        assert!(sdk.are_tecs_at_set_temperature().unwrap());
    }

    #[test]
    fn test_arm_refused_with_open_interlock() {
        let mut sdk = SimulatedMircat::new(SimulatedConfig {
            interlock_set: false,
            ..Default::default()
        });
        sdk.initialize().unwrap();
        assert_eq!(sdk.arm_laser().unwrap_err().code, SIM_INTERLOCK_OPEN);
    }

    #[test]
    fn test_tune_requires_armed() {
        let mut sdk = ready_model();
        let err = sdk
            .tune_to_wavelength(7.0, WavelengthUnits::Microns, 1)
            .unwrap_err();
        assert_eq!(err.code, SIM_NOT_ARMED);

        arm(&mut sdk);
        sdk.tune_to_wavelength(7.0, WavelengthUnits::Microns, 1)
            .unwrap();
        assert_eq!(sdk.tuned_wavelength().unwrap().wavelength, 7.0);
        assert_eq!(
            sdk.tune_to_wavelength(7.0, WavelengthUnits::Microns, 9)
                .unwrap_err()
                .code,
            SIM_BAD_QCL
        );
    }

    #[test]
    fn test_sweep_progresses_to_completion() {
        let mut sdk = ready_model();
        arm(&mut sdk);
        sdk.start_sweep_scan(&SweepParams {
            start: 6.7,
            stop: 7.2,
            speed: 0.1,
            units: WavelengthUnits::Microns,
            num_scans: 2,
            bidirectional: false,
            qcl: 1,
        })
        .unwrap();

        let mut last = ScanStatus::default();
        for _ in 0..100 {
            last = sdk.scan_status().unwrap();
            if !last.in_progress {
                break;
            }
        }
        assert!(!last.in_progress);
        assert_eq!(last.percent, 100);
        assert_eq!(last.scan_number, 2);
    }

    #[test]
    fn test_multi_spectral_capacity() {
        let mut sdk = ready_model();
        arm(&mut sdk);
        sdk.set_num_multi_spectral_elements(1).unwrap();
        let element = MultiSpectralElement {
            wavelength: 5.7,
            units: WavelengthUnits::Microns,
            dwell_ms: 100,
            off_ms: 10,
        };
        sdk.add_multi_spectral_element(&element).unwrap();
        assert_eq!(
            sdk.add_multi_spectral_element(&element).unwrap_err().code,
            SIM_BAD_SCAN
        );
        sdk.start_multi_spectral_scan(1).unwrap();
        assert!(sdk.scan_status().unwrap().in_progress);
    }

    #[test]
    fn test_call_log_records_order() {
        let mut sdk = ready_model();
        let log = sdk.call_log();
        sdk.deinitialize().unwrap();
        assert_eq!(
            *log.lock(),
            vec!["MIRcatSDK_Initialize", "MIRcatSDK_DeInitialize"]
        );
    }
}
