//! Scan requests and their outcome

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use irspec_core::{DeviceError, DeviceResult};

use crate::sdk::{MultiSpectralElement, ScanStatus, StepMeasureParams, SweepParams};

/// One of the three scan modes, tagged by `mode` in JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScanRequest {
    Sweep(SweepParams),
    StepMeasure(StepMeasureParams),
    MultiSpectral {
        elements: Vec<MultiSpectralElement>,
        #[serde(default = "default_num_scans")]
        num_scans: u16,
    },
}

fn default_num_scans() -> u16 {
    1
}

fn positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

fn check_range(start: f32, stop: f32) -> DeviceResult<()> {
    if !positive(start) || !positive(stop) {
        return Err(DeviceError::InvalidRequest(format!(
            "scan bounds must be positive, got {start}..{stop}"
        )));
    }
    if start == stop {
        return Err(DeviceError::InvalidRequest(
            "scan start and stop must differ".into(),
        ));
    }
    Ok(())
}

impl ScanRequest {
    pub fn mode(&self) -> &'static str {
        match self {
            ScanRequest::Sweep(_) => "sweep",
            ScanRequest::StepMeasure(_) => "step_measure",
            ScanRequest::MultiSpectral { .. } => "multi_spectral",
        }
    }

    /// Reject requests the laser cannot run before touching the SDK
    pub fn validate(&self) -> DeviceResult<()> {
        match self {
            ScanRequest::Sweep(p) => {
                check_range(p.start, p.stop)?;
                if !positive(p.speed) {
                    return Err(DeviceError::InvalidRequest(
                        "sweep speed must be positive".into(),
                    ));
                }
                if p.num_scans == 0 {
                    return Err(DeviceError::InvalidRequest("num_scans must be at least 1".into()));
                }
            }
            ScanRequest::StepMeasure(p) => {
                check_range(p.start, p.stop)?;
                if !positive(p.step) {
                    return Err(DeviceError::InvalidRequest(
                        "step size must be positive".into(),
                    ));
                }
                if p.num_scans == 0 {
                    return Err(DeviceError::InvalidRequest("num_scans must be at least 1".into()));
                }
            }
            ScanRequest::MultiSpectral { elements, num_scans } => {
                if elements.is_empty() || elements.len() > usize::from(u8::MAX) {
                    return Err(DeviceError::InvalidRequest(format!(
                        "multi-spectral scans take 1 to {} elements, got {}",
                        u8::MAX,
                        elements.len()
                    )));
                }
                if let Some(bad) = elements
                    .iter()
                    .find(|e| !positive(e.wavelength))
                {
                    return Err(DeviceError::InvalidRequest(format!(
                        "invalid element wavelength {}",
                        bad.wavelength
                    )));
                }
                if *num_scans == 0 {
                    return Err(DeviceError::InvalidRequest("num_scans must be at least 1".into()));
                }
            }
        }
        Ok(())
    }
}

/// Outcome of a completed scan
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub scan_id: Uuid,
    pub mode: &'static str,
    /// Status polls taken until the scan left `in_progress`
    pub polls: u64,
    pub final_status: ScanStatus,
}
