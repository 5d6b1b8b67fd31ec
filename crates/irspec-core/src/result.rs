//! Per-call command outcome

use serde::{Deserialize, Serialize};

use crate::error::DeviceResult;

/// Outcome of a single device command.
///
/// Produced per call and never stored; this is the shape reported for each
/// step of a procedural sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> CommandResult<T> {
    pub fn success(value: T) -> Self {
        Self {
            ok: true,
            value: Some(value),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            value: None,
            error: Some(error.into()),
        }
    }
}

impl<T> From<DeviceResult<T>> for CommandResult<T> {
    fn from(result: DeviceResult<T>) -> Self {
        match result {
            Ok(value) => Self::success(value),
            Err(e) => Self::failure(e.to_string()),
        }
    }
}
