//! Bounded polling primitive
//!
//! Device SDKs report progress through status queries that have to be
//! polled at a fixed interval until a terminal condition is reached. Every
//! such loop goes through [`poll_until`], which bounds the total wait and
//! honours a cancellation token.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{DeviceError, DeviceResult};

/// Interval and upper bound for a polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Sleep between two probes
    pub interval: Duration,
    /// Give up after this long
    pub max_wait: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_wait: Duration) -> Self {
        Self { interval, max_wait }
    }

    pub fn from_millis(interval_ms: u64, max_wait: Duration) -> Self {
        Self::new(Duration::from_millis(interval_ms), max_wait)
    }
}

/// Call `probe` until it yields `Some`, an error, the token is cancelled, or
/// `policy.max_wait` elapses.
///
/// The probe runs once immediately. `what` names the awaited condition in the
/// timeout error.
pub async fn poll_until<T, F>(
    policy: &PollPolicy,
    cancel: &CancellationToken,
    what: &str,
    mut probe: F,
) -> DeviceResult<T>
where
    F: FnMut() -> DeviceResult<Option<T>>,
{
    let deadline = Instant::now() + policy.max_wait;
    let mut rounds: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            tracing::debug!(what, rounds, "Poll cancelled");
            return Err(DeviceError::Cancelled);
        }

        if let Some(value) = probe()? {
            tracing::trace!(what, rounds, "Poll condition reached");
            return Ok(value);
        }
        rounds += 1;

        let now = Instant::now();
        if now >= deadline {
            tracing::warn!(what, rounds, "Poll exceeded maximum wait");
            return Err(DeviceError::PollTimeout(what.to_string()));
        }

        let nap = policy.interval.min(deadline - now);
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(what, rounds, "Poll cancelled");
                return Err(DeviceError::Cancelled);
            }
            _ = tokio::time::sleep(nap) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> PollPolicy {
        PollPolicy::from_millis(10, Duration::from_millis(100))
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_first_value() {
        let cancel = CancellationToken::new();
        let mut calls = 0;
        let value = poll_until(&policy(), &cancel, "ready", || {
            calls += 1;
            Ok(if calls == 3 { Some(calls) } else { None })
        })
        .await
        .unwrap();
        assert_eq!(value, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_propagates_probe_error() {
        let cancel = CancellationToken::new();
        let result: DeviceResult<()> = poll_until(&policy(), &cancel, "ready", || {
            Err(DeviceError::Sdk {
                call: "IsTuned",
                code: 7,
            })
        })
        .await;
        assert_eq!(
            result,
            Err(DeviceError::Sdk {
                call: "IsTuned",
                code: 7
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let cancel = CancellationToken::new();
        let result: DeviceResult<()> =
            poll_until(&policy(), &cancel, "tuning", || Ok(None)).await;
        assert_eq!(result, Err(DeviceError::PollTimeout("tuning".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut calls = 0;
        let result: DeviceResult<()> = poll_until(&policy(), &cancel, "armed", || {
            calls += 1;
            Ok(None)
        })
        .await;
        assert_eq!(result, Err(DeviceError::Cancelled));
        assert_eq!(calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_while_waiting() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(25)).await;
            trigger.cancel();
        });
        let long = PollPolicy::from_millis(10, Duration::from_secs(60));
        let result: DeviceResult<()> = poll_until(&long, &cancel, "scan", || Ok(None)).await;
        assert_eq!(result, Err(DeviceError::Cancelled));
    }
}
