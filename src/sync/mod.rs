//! Sync core: per-entity executors and the per-store orchestrator.

pub mod executor;
pub mod orchestrator;
pub mod outcome;

pub use executor::{ExecutorSettings, SyncExecutor, MAX_PAGE_SIZE};
pub use orchestrator::{OrchestratorSettings, SyncOrchestrator, SyncRequest};
pub use outcome::{
    PhaseAbort, PhaseFailure, PhaseReport, PhaseResult, RecordError, RunState, SyncOutcome, SyncRunSummary,
    SyncTrigger,
};
