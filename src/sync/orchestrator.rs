//! Per-store sync runs.
//!
//! A run validates the store, claims it, then runs the requested phases in
//! canonical order (category, product, customer, order). Each phase runs on
//! the [`BackgroundRunner`]; a failed phase is recorded and the next one
//! still runs.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::executor::{ExecutorSettings, SyncExecutor};
use super::outcome::{PhaseAbort, PhaseFailure, PhaseReport, PhaseResult, RunState, SyncOutcome, SyncRunSummary, SyncTrigger};
use crate::audit::{AuditEntry, AuditSink};
use crate::domain::aggregates::{Store, StoreSyncStatus};
use crate::domain::events::SyncEvent;
use crate::mapper::{Categories, Customers, MapContext, Orders, Products};
use crate::remote::{AdapterFactory, RemotePlatformAdapter};
use crate::repo::Repositories;
use crate::worker::{BackgroundRunner, TaskReport};
use crate::{EntityKind, PhaseStatus, Result, SyncError};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncRequest {
    pub store_id: Uuid,
    pub organization_id: Uuid,
    pub actor_id: Uuid,
    /// Subset of kinds to sync; `None` syncs everything.
    #[serde(default)]
    pub entity_types: Option<Vec<EntityKind>>,
    #[serde(default)]
    pub trigger: SyncTrigger,
}

impl SyncRequest {
    pub fn new(store_id: Uuid, organization_id: Uuid, actor_id: Uuid, trigger: SyncTrigger) -> Self {
        Self { store_id, organization_id, actor_id, entity_types: None, trigger }
    }

    pub fn only(mut self, kinds: impl Into<Vec<EntityKind>>) -> Self {
        self.entity_types = Some(kinds.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub executor: ExecutorSettings,
    /// A running claim older than this is considered abandoned.
    pub stale_lock: chrono::Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self { executor: ExecutorSettings::default(), stale_lock: chrono::Duration::hours(2) }
    }
}

/// A validated, claimed run waiting to execute.
struct ClaimedRun {
    request: SyncRequest,
    store: Store,
    adapter: Arc<dyn RemotePlatformAdapter>,
    kinds: Vec<EntityKind>,
}

#[derive(Clone)]
pub struct SyncOrchestrator {
    repos: Repositories,
    adapters: Arc<dyn AdapterFactory>,
    audit: Arc<dyn AuditSink>,
    runner: BackgroundRunner,
    settings: OrchestratorSettings,
}

impl SyncOrchestrator {
    pub fn new(
        repos: Repositories,
        adapters: Arc<dyn AdapterFactory>,
        audit: Arc<dyn AuditSink>,
        runner: BackgroundRunner,
        settings: OrchestratorSettings,
    ) -> Self {
        Self { repos, adapters, audit, runner, settings }
    }

    pub fn repositories(&self) -> &Repositories { &self.repos }

    /// Validates and claims the store, then runs in the background.
    pub async fn start(&self, request: SyncRequest) -> Result<JoinHandle<SyncRunSummary>> {
        let run = self.prepare(request).await?;
        let this = self.clone();
        Ok(tokio::spawn(async move { this.execute(run).await }))
    }

    /// Validates, claims and runs to completion.
    pub async fn run(&self, request: SyncRequest) -> Result<SyncRunSummary> {
        let run = self.prepare(request).await?;
        Ok(self.execute(run).await)
    }

    pub async fn sync_status(&self, store_id: Uuid) -> Result<StoreSyncStatus> {
        let store = self.repos.stores.find_store(store_id).await?.ok_or(SyncError::StoreNotFound(store_id))?;
        Ok(store.status())
    }

    async fn prepare(&self, request: SyncRequest) -> Result<ClaimedRun> {
        match self.validate_and_claim(&request).await {
            Ok((store, adapter, kinds)) => Ok(ClaimedRun { request, store, adapter, kinds }),
            Err(err) => {
                tracing::warn!(store_id = %request.store_id, error = %err, "Sync rejected");
                let event = SyncEvent::RunRejected {
                    error_kind: err.kind(),
                    message: err.to_string(),
                    remediation: err.remediation().to_string(),
                };
                self.audit(&request, event).await;
                Err(err)
            }
        }
    }

    async fn validate_and_claim(&self, request: &SyncRequest) -> Result<(Store, Arc<dyn RemotePlatformAdapter>, Vec<EntityKind>)> {
        let store = self
            .repos
            .stores
            .find_store(request.store_id)
            .await?
            .filter(|s| s.organization_id == request.organization_id)
            .ok_or(SyncError::StoreNotFound(request.store_id))?;
        let organization = self
            .repos
            .organizations
            .find_organization(request.organization_id)
            .await?
            .ok_or(SyncError::OrganizationNotFound(request.organization_id))?;

        if !organization.is_active {
            return Err(SyncError::OrganizationInactive(organization.id));
        }
        if !store.is_active {
            return Err(SyncError::StoreInactive(store.id));
        }
        if !store.platform.is_supported() {
            return Err(SyncError::UnsupportedPlatform(store.platform));
        }
        if !store.has_credentials() {
            return Err(SyncError::MissingCredentials(store.id));
        }
        let adapter = self.adapters.adapter_for(&store)?;

        let kinds = EntityKind::canonical(request.entity_types.as_deref());
        let stale_before = Utc::now() - self.settings.stale_lock;
        if !self.repos.stores.try_claim_sync(store.id, &kinds, stale_before).await? {
            return Err(SyncError::SyncInProgress(store.id));
        }
        Ok((store, adapter, kinds))
    }

    async fn execute(&self, run: ClaimedRun) -> SyncRunSummary {
        let ClaimedRun { request, store, adapter, kinds } = run;
        let started_at = Utc::now();
        tracing::info!(store_id = %store.id, trigger = ?request.trigger, kinds = ?kinds, "Sync started");
        self.audit(&request, SyncEvent::RunStarted { trigger: request.trigger, kinds: kinds.clone() }).await;

        let mut phases = Vec::with_capacity(kinds.len());
        for kind in kinds {
            self.set_status(store.id, kind, PhaseStatus::Running).await;
            let result = self.run_phase(&store, adapter.clone(), kind).await;

            let (status, event) = match &result {
                PhaseResult::Completed { outcome } => {
                    (PhaseStatus::Completed, SyncEvent::PhaseCompleted { kind, outcome: outcome.clone() })
                }
                PhaseResult::Failed { failure } => {
                    (PhaseStatus::Failed, SyncEvent::PhaseFailed { kind, failure: failure.clone() })
                }
            };
            self.set_status(store.id, kind, status).await;
            self.audit(&request, event).await;
            phases.push(PhaseReport { kind, result });
        }

        let state = match phases.iter().find(|p| p.is_failed()) {
            Some(failed) => RunState::Failed { phase: failed.kind },
            None => RunState::Completed,
        };
        let finished_at = Utc::now();
        if let Err(err) = self.repos.stores.release_sync(store.id, finished_at).await {
            tracing::error!(store_id = %store.id, error = %err, "Could not release sync claim");
        }
        self.audit(&request, SyncEvent::RunFinished { state }).await;
        tracing::info!(store_id = %store.id, state = ?state, "Sync finished");

        SyncRunSummary { store_id: store.id, trigger: request.trigger, phases, state, started_at, finished_at }
    }

    async fn run_phase(&self, store: &Store, adapter: Arc<dyn RemotePlatformAdapter>, kind: EntityKind) -> PhaseResult {
        let ctx = match self.map_context(store.id, kind).await {
            Ok(ctx) => ctx,
            Err(err) => return PhaseResult::Failed { failure: PhaseFailure::from_error(&err, None) },
        };

        let settings = self.settings.executor.clone();
        let repos = &self.repos;
        let label = format!("sync:{}:{}", store.id, kind);
        let handle = match kind {
            EntityKind::Category => {
                let executor = SyncExecutor::<Categories>::new(store, adapter, repos.categories.clone(), ctx, settings);
                self.runner.submit(label, executor.execute())
            }
            EntityKind::Product => {
                let executor = SyncExecutor::<Products>::new(store, adapter, repos.products.clone(), ctx, settings);
                self.runner.submit(label, executor.execute())
            }
            EntityKind::Customer => {
                let executor = SyncExecutor::<Customers>::new(store, adapter, repos.customers.clone(), ctx, settings);
                self.runner.submit(label, executor.execute())
            }
            EntityKind::Order => {
                let executor = SyncExecutor::<Orders>::new(store, adapter, repos.orders.clone(), ctx, settings);
                self.runner.submit(label, executor.execute())
            }
        };

        phase_result(handle.report().await)
    }

    /// Indexes of every kind the phase's payloads reference.
    async fn map_context(&self, store_id: Uuid, kind: EntityKind) -> Result<MapContext> {
        let mut ctx = MapContext::new();
        for referenced in kind.references() {
            let pairs = self.repos.remote_index(*referenced, store_id).await?;
            ctx = ctx.with_index(*referenced, pairs);
        }
        Ok(ctx)
    }

    async fn set_status(&self, store_id: Uuid, kind: EntityKind, status: PhaseStatus) {
        if let Err(err) = self.repos.stores.set_phase_status(store_id, kind, status).await {
            tracing::error!(store_id = %store_id, kind = %kind, error = %err, "Could not record phase status");
        }
    }

    async fn audit(&self, request: &SyncRequest, event: SyncEvent) {
        let entry = AuditEntry::new(request.store_id, request.organization_id, request.actor_id, event);
        if let Err(err) = self.audit.record(&entry).await {
            tracing::warn!(store_id = %request.store_id, event = entry.event.name(), error = %err, "Audit sink failed");
        }
    }
}

fn phase_result(report: TaskReport<SyncOutcome, PhaseAbort>) -> PhaseResult {
    match report {
        TaskReport::Completed(outcome) => PhaseResult::Completed { outcome },
        TaskReport::Failed(abort) => PhaseResult::Failed { failure: PhaseFailure::from_error(&abort.error, Some(abort.outcome)) },
        TaskReport::Crashed(reason) => PhaseResult::Failed { failure: PhaseFailure::crashed(reason) },
    }
}
