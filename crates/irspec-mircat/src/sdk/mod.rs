//! MIRcat SDK call surface
//!
//! The vendor SDK is a C library where every call returns a numeric result
//! code (0 on success) and writes its outputs through pointers. [`MircatSdk`]
//! mirrors that surface one method per native call, with out-parameters
//! turned into return values and non-zero codes turned into [`SdkError`].
//!
//! Implementations:
//! - [`simulated::SimulatedMircat`]: in-process laser model
//! - `native::NativeMircat`: FFI binding (feature `native-sdk`)

pub mod simulated;

#[cfg(feature = "native-sdk")]
pub mod native;

use irspec_core::{DeviceError, DeviceResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{DriverKind, MircatConfig};

/// Result code reported by every successful SDK call
pub const RET_SUCCESS: u32 = 0;

/// Result type for SDK calls
pub type SdkResult<T> = Result<T, SdkError>;

/// A native call returned a non-success code
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{call} returned {code}")]
pub struct SdkError {
    pub call: &'static str,
    pub code: u32,
}

impl SdkError {
    /// Map a raw result code to `Ok(())` or an error naming the call
    pub fn check(call: &'static str, code: u32) -> SdkResult<()> {
        if code == RET_SUCCESS {
            Ok(())
        } else {
            Err(SdkError { call, code })
        }
    }
}

impl From<SdkError> for DeviceError {
    fn from(err: SdkError) -> Self {
        DeviceError::Sdk {
            call: err.call,
            code: err.code,
        }
    }
}

/// Wavelength units understood by the SDK
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WavelengthUnits {
    #[default]
    Microns,
    /// cm⁻¹
    Wavenumbers,
}

impl WavelengthUnits {
    pub fn code(self) -> u8 {
        match self {
            WavelengthUnits::Microns => 1,
            WavelengthUnits::Wavenumbers => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(WavelengthUnits::Microns),
            2 => Some(WavelengthUnits::Wavenumbers),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApiVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Wavelength the laser was last asked to tune to
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TunedWavelength {
    pub wavelength: f32,
    pub units: WavelengthUnits,
    pub qcl: u8,
}

/// Wavelength the laser reports right now
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ActualWavelength {
    pub wavelength: f32,
    pub units: WavelengthUnits,
    pub light_valid: bool,
}

/// Result of the shared scan-status query
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ScanStatus {
    pub in_progress: bool,
    pub active: bool,
    pub paused: bool,
    pub scan_number: u16,
    pub percent: u16,
    pub current_wavelength: f32,
    pub units: WavelengthUnits,
    pub tec_in_progress: bool,
    pub motion_in_progress: bool,
}

/// Continuous sweep between two wavelengths
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepParams {
    pub start: f32,
    pub stop: f32,
    /// Sweep speed in units per second
    pub speed: f32,
    #[serde(default)]
    pub units: WavelengthUnits,
    #[serde(default = "one_u16")]
    pub num_scans: u16,
    #[serde(default)]
    pub bidirectional: bool,
    #[serde(default = "one_u8")]
    pub qcl: u8,
}

/// Discrete step-and-measure scan across a stepped range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepMeasureParams {
    pub start: f32,
    pub stop: f32,
    pub step: f32,
    #[serde(default)]
    pub units: WavelengthUnits,
    #[serde(default = "one_u8")]
    pub num_scans: u8,
}

/// One entry of a multi-spectral wavelength list
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MultiSpectralElement {
    pub wavelength: f32,
    #[serde(default)]
    pub units: WavelengthUnits,
    /// Time spent emitting at this wavelength
    pub dwell_ms: u32,
    /// Time spent off before moving on
    #[serde(default)]
    pub off_ms: u32,
}

fn one_u8() -> u8 {
    1
}

fn one_u16() -> u16 {
    1
}

/// The native MIRcat call surface
///
/// Calls are blocking and cheap; long-running work (arming, tuning,
/// scanning) is started by one call and observed by polling another.
pub trait MircatSdk: Send {
    fn api_version(&mut self) -> SdkResult<ApiVersion>;
    fn initialize(&mut self) -> SdkResult<()>;
    fn deinitialize(&mut self) -> SdkResult<()>;
    fn num_installed_qcls(&mut self) -> SdkResult<u8>;

    fn is_interlock_set(&mut self) -> SdkResult<bool>;
    fn is_key_switch_set(&mut self) -> SdkResult<bool>;

    fn is_laser_armed(&mut self) -> SdkResult<bool>;
    fn arm_laser(&mut self) -> SdkResult<()>;
    fn disarm_laser(&mut self) -> SdkResult<()>;
    fn are_tecs_at_set_temperature(&mut self) -> SdkResult<bool>;
    fn qcl_temperature(&mut self, qcl: u8) -> SdkResult<f32>;
    fn tec_current(&mut self, qcl: u8) -> SdkResult<u16>;

    fn tune_to_wavelength(
        &mut self,
        wavelength: f32,
        units: WavelengthUnits,
        qcl: u8,
    ) -> SdkResult<()>;
    fn tuned_wavelength(&mut self) -> SdkResult<TunedWavelength>;
    fn is_tuned(&mut self) -> SdkResult<bool>;
    fn actual_wavelength(&mut self) -> SdkResult<ActualWavelength>;
    fn cancel_manual_tune_mode(&mut self) -> SdkResult<()>;

    fn emission_on(&mut self) -> SdkResult<()>;
    fn emission_off(&mut self) -> SdkResult<()>;
    fn is_emission_on(&mut self) -> SdkResult<bool>;

    fn start_sweep_scan(&mut self, params: &SweepParams) -> SdkResult<()>;
    fn start_step_measure_scan(&mut self, params: &StepMeasureParams) -> SdkResult<()>;
    fn set_num_multi_spectral_elements(&mut self, count: u8) -> SdkResult<()>;
    fn add_multi_spectral_element(&mut self, element: &MultiSpectralElement) -> SdkResult<()>;
    fn start_multi_spectral_scan(&mut self, num_scans: u16) -> SdkResult<()>;
    fn scan_status(&mut self) -> SdkResult<ScanStatus>;
    fn stop_scan(&mut self) -> SdkResult<()>;
}

/// Build the SDK implementation selected by `config.driver`
pub fn create_sdk(config: &MircatConfig) -> DeviceResult<Box<dyn MircatSdk>> {
    match config.driver {
        DriverKind::Simulated => Ok(Box::new(simulated::SimulatedMircat::new(
            config.simulation.clone(),
        ))),
        #[cfg(feature = "native-sdk")]
        DriverKind::Native => Ok(Box::new(native::NativeMircat::new())),
        #[cfg(not(feature = "native-sdk"))]
        DriverKind::Native => Err(DeviceError::Internal(
            "native MIRcat driver not compiled in (enable feature `native-sdk`)".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_codes() {
        assert!(SdkError::check("MIRcatSDK_Initialize", RET_SUCCESS).is_ok());
        let err = SdkError::check("MIRcatSDK_Initialize", 4).unwrap_err();
        assert_eq!(err.to_string(), "MIRcatSDK_Initialize returned 4");
        let device: DeviceError = err.into();
        assert_eq!(
            device,
            DeviceError::Sdk {
                call: "MIRcatSDK_Initialize",
                code: 4
            }
        );
    }

    #[test]
    fn test_units_codes() {
        for units in [WavelengthUnits::Microns, WavelengthUnits::Wavenumbers] {
            assert_eq!(WavelengthUnits::from_code(units.code()), Some(units));
        }
        assert_eq!(WavelengthUnits::from_code(0), None);
    }

    #[test]
    fn test_create_sdk_selects_driver() {
        assert!(create_sdk(&MircatConfig::default()).is_ok());

        let native = MircatConfig {
            driver: DriverKind::Native,
            ..Default::default()
        };
        #[cfg(not(feature = "native-sdk"))]
        assert!(matches!(create_sdk(&native), Err(DeviceError::Internal(_))));
        #[cfg(feature = "native-sdk")]
        assert!(create_sdk(&native).is_ok());
    }

    #[test]
    fn test_sweep_defaults() {
        let params: SweepParams =
            serde_json::from_str(r#"{"start": 6.7, "stop": 7.2, "speed": 0.1}"#).unwrap();
        assert_eq!(params.units, WavelengthUnits::Microns);
        assert_eq!(params.num_scans, 1);
        assert_eq!(params.qcl, 1);
        assert!(!params.bidirectional);
    }
}
