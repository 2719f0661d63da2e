//! Results of phases and runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EntityKind, ErrorKind, SyncError};

/// One record that could not be reconciled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordError {
    pub record: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Tallies produced by one executor run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    /// Local records created on the remote platform.
    pub created_remote: u32,
    /// Remote records imported as new local records.
    pub imported: u32,
    pub pushed: u32,
    pub pulled: u32,
    pub orphaned: u32,
    pub failed: u32,
    pub unchanged: u32,
    /// List pages that could not be fetched.
    pub fetch_errors: u32,
    pub errors: Vec<RecordError>,
}

impl SyncOutcome {
    pub fn created(&self) -> u32 { self.created_remote + self.imported }

    pub fn updated(&self) -> u32 { self.pushed + self.pulled }

    pub fn record_failure(&mut self, record: impl Into<String>, err: &SyncError) {
        self.failed += 1;
        self.errors.push(RecordError { record: record.into(), kind: err.kind(), message: err.to_string() });
    }

    pub fn has_failures(&self) -> bool { self.failed > 0 || self.fetch_errors > 0 }
}

/// An executor stopped before finishing its phase.
#[derive(Debug)]
pub struct PhaseAbort {
    pub error: SyncError,
    /// Work done before the abort; already persisted.
    pub outcome: SyncOutcome,
}

impl PhaseAbort {
    pub fn new(error: impl Into<SyncError>, outcome: SyncOutcome) -> Self {
        Self { error: error.into(), outcome }
    }
}

/// Why a phase ended in `failed`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseFailure {
    pub error_kind: ErrorKind,
    pub message: String,
    pub remediation: String,
    /// The execution unit crashed rather than returning an error.
    pub infrastructure: bool,
    pub outcome: Option<SyncOutcome>,
}

impl PhaseFailure {
    pub fn from_error(error: &SyncError, outcome: Option<SyncOutcome>) -> Self {
        Self {
            error_kind: error.kind(),
            message: error.to_string(),
            remediation: error.remediation().to_string(),
            infrastructure: matches!(error, SyncError::Infrastructure(_)),
            outcome,
        }
    }

    pub fn crashed(reason: impl Into<String>) -> Self {
        let error = SyncError::Infrastructure(reason.into());
        Self::from_error(&error, None)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PhaseResult {
    Completed { outcome: SyncOutcome },
    Failed { failure: PhaseFailure },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub kind: EntityKind,
    pub result: PhaseResult,
}

impl PhaseReport {
    pub fn is_failed(&self) -> bool { matches!(self.result, PhaseResult::Failed { .. }) }
}

/// Terminal state of a run. `Failed` names the first failed phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Completed,
    Failed { phase: EntityKind },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    /// Store created with usable credentials.
    Automatic,
    #[default]
    Manual,
    Scheduled,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncRunSummary {
    pub store_id: Uuid,
    pub trigger: SyncTrigger,
    pub phases: Vec<PhaseReport>,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncRunSummary {
    pub fn phase(&self, kind: EntityKind) -> Option<&PhaseReport> {
        self.phases.iter().find(|p| p.kind == kind)
    }

    pub fn outcome(&self, kind: EntityKind) -> Option<&SyncOutcome> {
        match &self.phase(kind)?.result {
            PhaseResult::Completed { outcome } => Some(outcome),
            PhaseResult::Failed { failure } => failure.outcome.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RemoteError;

    #[test]
    fn test_totals_fold_directions() {
        let outcome = SyncOutcome { created_remote: 1, imported: 2, pushed: 3, pulled: 4, ..Default::default() };
        assert_eq!(outcome.created(), 3);
        assert_eq!(outcome.updated(), 7);
    }

    #[test]
    fn test_record_failure_keeps_kind() {
        let mut outcome = SyncOutcome::default();
        let err = SyncError::from(RemoteError::Validation { status: 400, code: Some("invalid_sku".into()), message: "bad sku".into() });
        outcome.record_failure("product Lamp", &err);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.errors[0].kind, ErrorKind::Validation);
    }

    #[test]
    fn test_crash_is_infrastructure() {
        let failure = PhaseFailure::crashed("worker panicked");
        assert!(failure.infrastructure);
        assert_eq!(failure.error_kind, ErrorKind::Infrastructure);
        assert!(failure.outcome.is_none());
    }
}
