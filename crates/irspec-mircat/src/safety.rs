//! What to do when the laser's safety interlock is not satisfied

use irspec_core::DeviceError;
use serde::Deserialize;
use tracing::error;

/// Process exit code used by [`InterlockPolicy::Abort`]
pub const INTERLOCK_EXIT_CODE: i32 = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterlockPolicy {
    /// Terminate the process
    #[default]
    Abort,
    /// Report `SafetyInterlock` to the caller
    Error,
}

impl InterlockPolicy {
    /// Apply the policy to a failed connect.
    ///
    /// The SDK must already be de-initialised. Under `Abort` a
    /// `SafetyInterlock` error ends the process; every other error is
    /// returned unchanged.
    pub fn enforce(self, err: DeviceError) -> DeviceError {
        if let (InterlockPolicy::Abort, DeviceError::SafetyInterlock(reason)) = (self, &err) {
            error!(reason = %reason, "Safety interlock not satisfied, aborting");
            std::process::exit(INTERLOCK_EXIT_CODE);
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_policy_passes_through() {
        let err = DeviceError::SafetyInterlock("key switch".into());
        assert_eq!(InterlockPolicy::Error.enforce(err.clone()), err);
    }

    #[test]
    fn test_abort_ignores_other_errors() {
        let err = DeviceError::Timeout;
        assert_eq!(InterlockPolicy::Abort.enforce(err.clone()), err);
    }
}
