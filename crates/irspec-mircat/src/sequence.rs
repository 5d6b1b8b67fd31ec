//! Linear bench procedure
//!
//! connect → arm → tune → emission on → optional scan → emission off →
//! disarm → disconnect. The first failing step ends the procedure, but the
//! shutdown steps always run once connected.

use irspec_core::{CancellationToken, CommandResult, DeviceError, DeviceResult, DeviceSession};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::scan::ScanRequest;
use crate::session::{LaserSession, TuneRequest};

/// What the procedure tunes to and scans
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencePlan {
    pub tune: TuneRequest,
    #[serde(default)]
    pub scan: Option<ScanRequest>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SequenceStep {
    pub step: &'static str,
    #[serde(flatten)]
    pub result: CommandResult<Value>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SequenceReport {
    pub steps: Vec<SequenceStep>,
}

impl SequenceReport {
    pub fn succeeded(&self) -> bool {
        self.steps.iter().all(|s| s.result.ok)
    }

    pub fn step(&self, name: &str) -> Option<&SequenceStep> {
        self.steps.iter().find(|s| s.step == name)
    }

    fn record(&mut self, step: &'static str, result: DeviceResult<Value>) -> bool {
        match &result {
            Ok(_) => info!(step, "Step complete"),
            Err(e) => warn!(step, error = %e, "Step failed"),
        }
        let result = CommandResult::from(result);
        let ok = result.ok;
        self.steps.push(SequenceStep { step, result });
        ok
    }
}

fn to_value<T: Serialize>(value: T) -> DeviceResult<Value> {
    serde_json::to_value(value).map_err(|e| DeviceError::Internal(e.to_string()))
}

/// Run the procedure against `session`
///
/// `cancel` interrupts the waiting steps; shutdown steps run with their own
/// token so a cancelled run still leaves the laser safe.
pub async fn run_sequence(
    session: &LaserSession,
    plan: &SequencePlan,
    cancel: &CancellationToken,
) -> SequenceReport {
    let mut report = SequenceReport::default();

    let connected = session
        .connect()
        .await
        .map(|()| json!({ "connected": true }));
    if !report.record("connect", connected) {
        return report;
    }

    let mut ok = report.record(
        "arm",
        session.arm(cancel).await.map(|()| json!({ "armed": true })),
    );
    if ok {
        ok = report.record(
            "tune",
            session.tune(plan.tune, cancel).await.and_then(to_value),
        );
    }
    if ok {
        ok = report.record(
            "emission_on",
            session
                .set_emission(true, cancel)
                .await
                .map(|emitting| json!({ "emitting": emitting })),
        );
    }
    if ok {
        if let Some(scan) = &plan.scan {
            report.record(
                "scan",
                session
                    .scan(scan.clone(), cancel)
                    .await
                    .and_then(to_value),
            );
        }
    }

    let shutdown = CancellationToken::new();
    report.record(
        "emission_off",
        session
            .set_emission(false, &shutdown)
            .await
            .map(|emitting| json!({ "emitting": emitting })),
    );
    report.record(
        "disarm",
        session
            .disarm()
            .await
            .map(|armed| json!({ "armed": armed })),
    );
    report.record(
        "disconnect",
        session
            .disconnect()
            .await
            .map(|()| json!({ "connected": false })),
    );

    report
}
