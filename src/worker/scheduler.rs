//! Periodic re-sync of idle stores.

use chrono::Utc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::sync::{SyncOrchestrator, SyncRequest, SyncTrigger};
use crate::SyncError;

/// Actor recorded on scheduled runs.
pub const SCHEDULER_ACTOR: Uuid = Uuid::nil();

/// Every `interval`, syncs each active idle store whose last sync is older
/// than `interval`. Stores are synced one after another.
pub fn spawn_schedule_worker(orchestrator: SyncOrchestrator, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let poll = interval.max(Duration::from_secs(5));
        loop {
            tokio::time::sleep(poll).await;
            run_due(&orchestrator, interval).await;
        }
    })
}

/// One scheduler tick. Returns how many stores were synced.
pub async fn run_due(orchestrator: &SyncOrchestrator, interval: Duration) -> usize {
    let Ok(age) = chrono::Duration::from_std(interval) else {
        tracing::warn!(interval_secs = interval.as_secs(), "Schedule interval out of range");
        return 0;
    };
    let due = match orchestrator.repositories().stores.list_due_for_sync(Utc::now() - age).await {
        Ok(due) => due,
        Err(err) => {
            tracing::warn!(error = %err, "Failed to load stores due for sync");
            return 0;
        }
    };

    let mut synced = 0;
    for store in due.into_iter().filter(|s| s.can_sync()) {
        let request = SyncRequest::new(store.id, store.organization_id, SCHEDULER_ACTOR, SyncTrigger::Scheduled);
        match orchestrator.run(request).await {
            Ok(summary) => {
                synced += 1;
                tracing::info!(store_id = %store.id, state = ?summary.state, "Scheduled sync finished");
            }
            Err(SyncError::SyncInProgress(_)) => {
                tracing::debug!(store_id = %store.id, "Scheduled sync skipped, run in progress");
            }
            Err(err) => {
                tracing::warn!(store_id = %store.id, error = %err, "Scheduled sync rejected");
            }
        }
    }
    synced
}
