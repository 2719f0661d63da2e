//! Domain events raised by sync runs
use serde::{Deserialize, Serialize};

use crate::sync::{PhaseFailure, RunState, SyncOutcome, SyncTrigger};
use crate::{EntityKind, ErrorKind};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    RunStarted { trigger: SyncTrigger, kinds: Vec<EntityKind> },
    /// The run could not start (missing store, inactive tenant, bad credentials).
    RunRejected { error_kind: ErrorKind, message: String, remediation: String },
    PhaseCompleted { kind: EntityKind, outcome: SyncOutcome },
    PhaseFailed { kind: EntityKind, failure: PhaseFailure },
    RunFinished { state: RunState },
}

impl SyncEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "sync.run_started",
            Self::RunRejected { .. } => "sync.run_rejected",
            Self::PhaseCompleted { .. } => "sync.phase_completed",
            Self::PhaseFailed { .. } => "sync.phase_failed",
            Self::RunFinished { .. } => "sync.run_finished",
        }
    }
}
