//! FFI binding to the vendor MIRcatSDK library

use super::{
    ActualWavelength, ApiVersion, MircatSdk, MultiSpectralElement, ScanStatus, SdkError,
    SdkResult, StepMeasureParams, SweepParams, TunedWavelength, WavelengthUnits,
};

#[allow(non_snake_case)]
#[link(name = "MIRcatSDK")]
extern "C" {
    fn MIRcatSDK_GetAPIVersion(major: *mut u16, minor: *mut u16, patch: *mut u16) -> u32;
    fn MIRcatSDK_Initialize() -> u32;
    fn MIRcatSDK_DeInitialize() -> u32;
    fn MIRcatSDK_GetNumInstalledQcls(count: *mut u8) -> u32;
    fn MIRcatSDK_IsInterlockedStatusSet(set: *mut bool) -> u32;
    fn MIRcatSDK_IsKeySwitchStatusSet(set: *mut bool) -> u32;
    fn MIRcatSDK_IsLaserArmed(armed: *mut bool) -> u32;
    fn MIRcatSDK_ArmDisarmLaser() -> u32;
    fn MIRcatSDK_DisarmLaser() -> u32;
    fn MIRcatSDK_AreTECsAtSetTemperature(ready: *mut bool) -> u32;
    fn MIRcatSDK_GetQCLTemperature(qcl: u8, temperature: *mut f32) -> u32;
    fn MIRcatSDK_GetTecCurrent(qcl: u8, current: *mut u16) -> u32;
    fn MIRcatSDK_TuneToWW(wavelength: f32, units: u8, qcl: u8) -> u32;
    fn MIRcatSDK_GetTuneWW(wavelength: *mut f32, units: *mut u8, qcl: *mut u8) -> u32;
    fn MIRcatSDK_IsTuned(tuned: *mut bool) -> u32;
    fn MIRcatSDK_GetActualWW(wavelength: *mut f32, units: *mut u8, light_valid: *mut bool)
        -> u32;
    fn MIRcatSDK_CancelManualTuneMode() -> u32;
    fn MIRcatSDK_TurnEmissionOn() -> u32;
    fn MIRcatSDK_TurnEmissionOff() -> u32;
    fn MIRcatSDK_IsEmissionOn(on: *mut bool) -> u32;
    fn MIRcatSDK_StartSweepScan(
        start: f32,
        stop: f32,
        speed: f32,
        units: u8,
        num_scans: u16,
        bidirectional: bool,
        qcl: u8,
    ) -> u32;
    fn MIRcatSDK_StartStepMeasureModeScan(
        start: f32,
        stop: f32,
        step: f32,
        units: u8,
        num_scans: u8,
    ) -> u32;
    fn MIRcatSDK_SetNumMultiSpectralElements(count: u8) -> u32;
    fn MIRcatSDK_AddMultiSpectralElement(
        wavelength: f32,
        units: u8,
        dwell_ms: u32,
        off_ms: u32,
    ) -> u32;
    fn MIRcatSDK_StartMultiSpectralModeScan(num_scans: u16) -> u32;
    fn MIRcatSDK_GetScanStatus(
        in_progress: *mut bool,
        active: *mut bool,
        paused: *mut bool,
        scan_number: *mut u16,
        percent: *mut u16,
        wavelength: *mut f32,
        units: *mut u8,
        tec_in_progress: *mut bool,
        motion_in_progress: *mut bool,
    ) -> u32;
    fn MIRcatSDK_StopScanInProgress() -> u32;
}

fn units_from(call: &'static str, code: u8) -> SdkResult<WavelengthUnits> {
    WavelengthUnits::from_code(code).ok_or(SdkError {
        call,
        code: u32::from(code),
    })
}

fn query_bool(call: &'static str, f: unsafe extern "C" fn(*mut bool) -> u32) -> SdkResult<bool> {
    let mut value = false;
    // SAFETY: the callee writes one bool through a valid pointer
    let code = unsafe { f(&mut value) };
    SdkError::check(call, code)?;
    Ok(value)
}

/// The process-wide vendor SDK instance
///
/// The library keeps global state; construct at most one per process.
pub struct NativeMircat {
    _private: (),
}

impl NativeMircat {
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl Default for NativeMircat {
    fn default() -> Self {
        Self::new()
    }
}

impl MircatSdk for NativeMircat {
    fn api_version(&mut self) -> SdkResult<ApiVersion> {
        let (mut major, mut minor, mut patch) = (0u16, 0u16, 0u16);
        // SAFETY: three valid out-pointers
        let code = unsafe { MIRcatSDK_GetAPIVersion(&mut major, &mut minor, &mut patch) };
        SdkError::check("MIRcatSDK_GetAPIVersion", code)?;
        Ok(ApiVersion {
            major,
            minor,
            patch,
        })
    }

    fn initialize(&mut self) -> SdkResult<()> {
        SdkError::check("MIRcatSDK_Initialize", unsafe { MIRcatSDK_Initialize() })
    }

    fn deinitialize(&mut self) -> SdkResult<()> {
        SdkError::check("MIRcatSDK_DeInitialize", unsafe {
            MIRcatSDK_DeInitialize()
        })
    }

    fn num_installed_qcls(&mut self) -> SdkResult<u8> {
        let mut count = 0u8;
        let code = unsafe { MIRcatSDK_GetNumInstalledQcls(&mut count) };
        SdkError::check("MIRcatSDK_GetNumInstalledQcls", code)?;
        Ok(count)
    }

    fn is_interlock_set(&mut self) -> SdkResult<bool> {
        query_bool(
            "MIRcatSDK_IsInterlockedStatusSet",
            MIRcatSDK_IsInterlockedStatusSet,
        )
    }

    fn is_key_switch_set(&mut self) -> SdkResult<bool> {
        query_bool("MIRcatSDK_IsKeySwitchStatusSet", MIRcatSDK_IsKeySwitchStatusSet)
    }

    fn is_laser_armed(&mut self) -> SdkResult<bool> {
        query_bool("MIRcatSDK_IsLaserArmed", MIRcatSDK_IsLaserArmed)
    }

    fn arm_laser(&mut self) -> SdkResult<()> {
        // Toggles; the session only calls it while disarmed
        SdkError::check("MIRcatSDK_ArmDisarmLaser", unsafe {
            MIRcatSDK_ArmDisarmLaser()
        })
    }

    fn disarm_laser(&mut self) -> SdkResult<()> {
        SdkError::check("MIRcatSDK_DisarmLaser", unsafe { MIRcatSDK_DisarmLaser() })
    }

    fn are_tecs_at_set_temperature(&mut self) -> SdkResult<bool> {
        query_bool(
            "MIRcatSDK_AreTECsAtSetTemperature",
            MIRcatSDK_AreTECsAtSetTemperature,
        )
    }

    fn qcl_temperature(&mut self, qcl: u8) -> SdkResult<f32> {
        let mut temperature = 0f32;
        let code = unsafe { MIRcatSDK_GetQCLTemperature(qcl, &mut temperature) };
        SdkError::check("MIRcatSDK_GetQCLTemperature", code)?;
        Ok(temperature)
    }

    fn tec_current(&mut self, qcl: u8) -> SdkResult<u16> {
        let mut current = 0u16;
        let code = unsafe { MIRcatSDK_GetTecCurrent(qcl, &mut current) };
        SdkError::check("MIRcatSDK_GetTecCurrent", code)?;
        Ok(current)
    }

    fn tune_to_wavelength(
        &mut self,
        wavelength: f32,
        units: WavelengthUnits,
        qcl: u8,
    ) -> SdkResult<()> {
        SdkError::check("MIRcatSDK_TuneToWW", unsafe {
            MIRcatSDK_TuneToWW(wavelength, units.code(), qcl)
        })
    }

    fn tuned_wavelength(&mut self) -> SdkResult<TunedWavelength> {
        let call = "MIRcatSDK_GetTuneWW";
        let (mut wavelength, mut units, mut qcl) = (0f32, 0u8, 0u8);
        let code = unsafe { MIRcatSDK_GetTuneWW(&mut wavelength, &mut units, &mut qcl) };
        SdkError::check(call, code)?;
        Ok(TunedWavelength {
            wavelength,
            units: units_from(call, units)?,
            qcl,
        })
    }

    fn is_tuned(&mut self) -> SdkResult<bool> {
        query_bool("MIRcatSDK_IsTuned", MIRcatSDK_IsTuned)
    }

    fn actual_wavelength(&mut self) -> SdkResult<ActualWavelength> {
        let call = "MIRcatSDK_GetActualWW";
        let (mut wavelength, mut units, mut light_valid) = (0f32, 0u8, false);
        let code = unsafe { MIRcatSDK_GetActualWW(&mut wavelength, &mut units, &mut light_valid) };
        SdkError::check(call, code)?;
        Ok(ActualWavelength {
            wavelength,
            units: WavelengthUnits::from_code(units).unwrap_or_default(),
            light_valid,
        })
    }

    fn cancel_manual_tune_mode(&mut self) -> SdkResult<()> {
        SdkError::check("MIRcatSDK_CancelManualTuneMode", unsafe {
            MIRcatSDK_CancelManualTuneMode()
        })
    }

    fn emission_on(&mut self) -> SdkResult<()> {
        SdkError::check("MIRcatSDK_TurnEmissionOn", unsafe {
            MIRcatSDK_TurnEmissionOn()
        })
    }

    fn emission_off(&mut self) -> SdkResult<()> {
        SdkError::check("MIRcatSDK_TurnEmissionOff", unsafe {
            MIRcatSDK_TurnEmissionOff()
        })
    }

    fn is_emission_on(&mut self) -> SdkResult<bool> {
        query_bool("MIRcatSDK_IsEmissionOn", MIRcatSDK_IsEmissionOn)
    }

    fn start_sweep_scan(&mut self, params: &SweepParams) -> SdkResult<()> {
        SdkError::check("MIRcatSDK_StartSweepScan", unsafe {
            MIRcatSDK_StartSweepScan(
                params.start,
                params.stop,
                params.speed,
                params.units.code(),
                params.num_scans,
                params.bidirectional,
                params.qcl,
            )
        })
    }

    fn start_step_measure_scan(&mut self, params: &StepMeasureParams) -> SdkResult<()> {
        SdkError::check("MIRcatSDK_StartStepMeasureModeScan", unsafe {
            MIRcatSDK_StartStepMeasureModeScan(
                params.start,
                params.stop,
                params.step,
                params.units.code(),
                params.num_scans,
            )
        })
    }

    fn set_num_multi_spectral_elements(&mut self, count: u8) -> SdkResult<()> {
        SdkError::check("MIRcatSDK_SetNumMultiSpectralElements", unsafe {
            MIRcatSDK_SetNumMultiSpectralElements(count)
        })
    }

    fn add_multi_spectral_element(&mut self, element: &MultiSpectralElement) -> SdkResult<()> {
        SdkError::check("MIRcatSDK_AddMultiSpectralElement", unsafe {
            MIRcatSDK_AddMultiSpectralElement(
                element.wavelength,
                element.units.code(),
                element.dwell_ms,
                element.off_ms,
            )
        })
    }

    fn start_multi_spectral_scan(&mut self, num_scans: u16) -> SdkResult<()> {
        SdkError::check("MIRcatSDK_StartMultiSpectralModeScan", unsafe {
            MIRcatSDK_StartMultiSpectralModeScan(num_scans)
        })
    }

    fn scan_status(&mut self) -> SdkResult<ScanStatus> {
        let mut status = ScanStatus::default();
        let mut units = 0u8;
        // SAFETY: every out-pointer refers to a live local
        let code = unsafe {
            MIRcatSDK_GetScanStatus(
                &mut status.in_progress,
                &mut status.active,
                &mut status.paused,
                &mut status.scan_number,
                &mut status.percent,
                &mut status.current_wavelength,
                &mut units,
                &mut status.tec_in_progress,
                &mut status.motion_in_progress,
            )
        };
        SdkError::check("MIRcatSDK_GetScanStatus", code)?;
        status.units = WavelengthUnits::from_code(units).unwrap_or_default();
        Ok(status)
    }

    fn stop_scan(&mut self) -> SdkResult<()> {
        SdkError::check("MIRcatSDK_StopScanInProgress", unsafe {
            MIRcatSDK_StopScanInProgress()
        })
    }
}
