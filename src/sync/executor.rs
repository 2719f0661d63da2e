//! Per-entity reconciliation.
//!
//! A [`SyncExecutor`] reconciles one entity kind of one store:
//!
//! 1. page through the remote collection,
//! 2. load the store's local records,
//! 3. import unclaimed remote records, then create, push, pull or orphan
//!    each active local record,
//! 4. persist every mutation as soon as it is decided.
//!
//! Direction is decided by timestamps: `local.updated_at > remote modified`
//! pushes, anything else pulls. After a create or push the record takes the
//! remote modification time, so an unchanged store reconciles to a no-op.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::outcome::{PhaseAbort, SyncOutcome};
use crate::domain::aggregates::{LocalRecord, Store};
use crate::domain::value_objects::RemoteId;
use crate::mapper::{MapContext, SyncEntity};
use crate::remote::{RemoteError, RemotePlatformAdapter, RemoteRecord};
use crate::repo::EntityRepository;
use crate::{RecordSyncStatus, SyncError};

pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub page_size: u32,
    /// Retries of a call answered with 429 before the phase aborts.
    pub rate_limit_retries: u32,
    /// First backoff step when the platform sends no `Retry-After`.
    pub retry_backoff: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self { page_size: MAX_PAGE_SIZE, rate_limit_retries: 3, retry_backoff: Duration::from_secs(1) }
    }
}

/// Remote listing of one kind, deduplicated by remote id.
struct RemoteListing<R> {
    records: Vec<R>,
    /// Every page was fetched; absence from the listing proves deletion.
    complete: bool,
}

pub struct SyncExecutor<E: SyncEntity> {
    store_id: Uuid,
    organization_id: Uuid,
    adapter: Arc<dyn RemotePlatformAdapter>,
    repo: Arc<dyn EntityRepository<E>>,
    ctx: MapContext,
    settings: ExecutorSettings,
    outcome: SyncOutcome,
}

impl<E: SyncEntity> SyncExecutor<E> {
    pub fn new(
        store: &Store,
        adapter: Arc<dyn RemotePlatformAdapter>,
        repo: Arc<dyn EntityRepository<E>>,
        ctx: MapContext,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            store_id: store.id,
            organization_id: store.organization_id,
            adapter,
            repo,
            ctx,
            settings,
            outcome: SyncOutcome::default(),
        }
    }

    pub async fn execute(mut self) -> Result<SyncOutcome, PhaseAbort> {
        let listing = match self.fetch_remote().await {
            Ok(listing) => listing,
            Err(err) => return Err(self.abort(err)),
        };
        let locals = match self.repo.list_for_store(self.store_id, self.organization_id).await {
            Ok(locals) => locals,
            Err(err) => return Err(self.abort(err)),
        };
        if let Err(err) = self.reconcile(listing, locals).await {
            return Err(self.abort(err));
        }

        let o = &self.outcome;
        tracing::info!(
            store_id = %self.store_id, kind = %E::KIND,
            created = o.created(), updated = o.updated(), orphaned = o.orphaned,
            unchanged = o.unchanged, failed = o.failed, fetch_errors = o.fetch_errors,
            "Phase reconciled"
        );
        Ok(self.outcome)
    }

    fn abort(self, error: SyncError) -> PhaseAbort {
        tracing::warn!(store_id = %self.store_id, kind = %E::KIND, error = %error, "Phase aborted");
        PhaseAbort::new(error, self.outcome)
    }

    /// Runs a remote call, waiting out 429 answers up to the retry budget.
    async fn call<T, F, Fut>(&self, op: F) -> Result<T, RemoteError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Err(RemoteError::RateLimit { retry_after }) if attempt < self.settings.rate_limit_retries => {
                    let delay = retry_after.unwrap_or_else(|| self.settings.retry_backoff.saturating_mul(1 << attempt.min(16)));
                    tracing::warn!(store_id = %self.store_id, kind = %E::KIND, attempt, delay_ms = delay.as_millis() as u64, "Rate limited, backing off");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    // -------------------------------------------------------------------------
    // Fetch
    // -------------------------------------------------------------------------

    async fn fetch_remote(&mut self) -> Result<RemoteListing<E::Remote>, SyncError> {
        let per_page = self.settings.page_size.clamp(1, MAX_PAGE_SIZE);
        let mut listing = RemoteListing { records: Vec::new(), complete: true };
        let mut seen = HashSet::new();
        let mut total_pages: Option<u32> = None;
        let mut page = 1u32;

        loop {
            let adapter = self.adapter.clone();
            let fetched = self.call(|| adapter.fetch_page(E::KIND, page, per_page)).await;
            match fetched {
                Ok(remote_page) => {
                    if remote_page.total_pages.is_some() {
                        total_pages = remote_page.total_pages;
                    }
                    let count = remote_page.items.len();
                    let mut fresh = 0usize;
                    for item in remote_page.items {
                        match decode::<E>(item) {
                            Ok(record) => {
                                if let Some(id) = record.remote_id() {
                                    if seen.insert(id) {
                                        fresh += 1;
                                        listing.records.push(record);
                                    }
                                }
                            }
                            Err((label, err)) => {
                                // An undecodable record may still exist remotely.
                                listing.complete = false;
                                self.outcome.record_failure(label, &err);
                            }
                        }
                    }
                    let last = count < per_page as usize || total_pages.is_some_and(|t| page >= t);
                    if last {
                        break;
                    }
                    // A server that ignores `page` and sends no page count repeats itself forever.
                    if fresh == 0 && total_pages.is_none() {
                        tracing::warn!(store_id = %self.store_id, kind = %E::KIND, page, "Page repeated earlier records, stopping listing");
                        listing.complete = false;
                        break;
                    }
                }
                Err(err) if page == 1 || err.is_phase_fatal() => return Err(err.into()),
                Err(err) => {
                    tracing::warn!(store_id = %self.store_id, kind = %E::KIND, page, error = %err, "Page fetch failed, skipping");
                    self.outcome.fetch_errors += 1;
                    listing.complete = false;
                    // Without a page count there is no way to tell where the listing ends.
                    if !total_pages.is_some_and(|t| page < t) {
                        break;
                    }
                }
            }
            page += 1;
        }

        tracing::debug!(store_id = %self.store_id, kind = %E::KIND, records = listing.records.len(), pages = page, "Remote listing fetched");
        Ok(listing)
    }

    // -------------------------------------------------------------------------
    // Reconcile
    // -------------------------------------------------------------------------

    async fn reconcile(&mut self, listing: RemoteListing<E::Remote>, locals: Vec<LocalRecord<E::Data>>) -> Result<(), SyncError> {
        let complete = listing.complete;
        let mut order: Vec<RemoteId> = Vec::with_capacity(listing.records.len());
        let mut remotes: HashMap<RemoteId, E::Remote> = HashMap::with_capacity(listing.records.len());
        for record in listing.records {
            if let Some(id) = record.remote_id() {
                order.push(id);
                remotes.insert(id, record);
            }
        }

        // Inactive records keep their remote ids claimed.
        let mut claimed: HashSet<RemoteId> = locals.iter().filter_map(|r| r.remote_id).collect();
        let mut active: Vec<_> = locals.into_iter().filter(|r| r.is_active).collect();

        let linked = self.link_by_natural_key(&mut active, &order, &remotes, &mut claimed);

        let imported = self.import_unclaimed(&order, &remotes, &claimed).await?;

        sort_parents_first::<E>(&mut active);
        for record in active {
            match record.remote_id {
                None => self.create_remote(record).await?,
                Some(rid) => match remotes.get(&rid) {
                    Some(remote) => {
                        let was_linked = linked.contains(&record.id);
                        self.reconcile_pair(record, remote, was_linked).await?
                    }
                    None if complete => self.recover_orphan(record).await,
                    None => self.outcome.unchanged += 1,
                },
            }
        }

        self.remap_imports(imported, &remotes).await;
        Ok(())
    }

    /// Links records without a remote id to unclaimed remote records with
    /// the same natural key. Returns the ids of the linked records.
    fn link_by_natural_key(
        &mut self,
        active: &mut [LocalRecord<E::Data>],
        order: &[RemoteId],
        remotes: &HashMap<RemoteId, E::Remote>,
        claimed: &mut HashSet<RemoteId>,
    ) -> HashSet<Uuid> {
        let mut by_key: HashMap<String, RemoteId> = HashMap::new();
        for id in order {
            if claimed.contains(id) {
                continue;
            }
            if let Some(key) = remotes.get(id).and_then(E::remote_natural_key) {
                by_key.entry(key).or_insert(*id);
            }
        }

        let mut linked = HashSet::new();
        for record in active.iter_mut().filter(|r| r.remote_id.is_none()) {
            let Some(key) = E::natural_key(&record.data) else { continue };
            let Some(rid) = by_key.remove(&key) else { continue };
            tracing::debug!(store_id = %self.store_id, kind = %E::KIND, record_id = %record.id, remote_id = %rid, "Linked by natural key");
            record.link(rid);
            claimed.insert(rid);
            linked.insert(record.id);
        }
        for record in active.iter() {
            if let Some(rid) = record.remote_id {
                self.ctx.register(E::KIND, record.id, rid);
            }
        }
        linked
    }

    async fn import_unclaimed(
        &mut self,
        order: &[RemoteId],
        remotes: &HashMap<RemoteId, E::Remote>,
        claimed: &HashSet<RemoteId>,
    ) -> Result<Vec<LocalRecord<E::Data>>, SyncError> {
        let mut imported = Vec::new();
        for rid in order.iter().filter(|id| !claimed.contains(id)) {
            let Some(remote) = remotes.get(rid) else { continue };
            let data = E::to_local(remote, &self.ctx);
            let record = LocalRecord::import(self.organization_id, self.store_id, *rid, remote.modified_at(), data);
            match self.repo.insert(&record).await {
                Ok(()) => {
                    self.ctx.register(E::KIND, record.id, *rid);
                    self.outcome.imported += 1;
                    imported.push(record);
                }
                Err(err) => {
                    tracing::warn!(store_id = %self.store_id, kind = %E::KIND, remote_id = %rid, error = %err, "Import failed");
                    self.outcome.record_failure(remote.label(), &err);
                }
            }
        }
        Ok(imported)
    }

    async fn create_remote(&mut self, mut record: LocalRecord<E::Data>) -> Result<(), SyncError> {
        let label = E::label(&record.data);
        let created = match serde_json::to_value(E::to_remote(&record.data, &self.ctx)) {
            Ok(payload) => {
                let adapter = self.adapter.clone();
                self.call(|| adapter.create(E::KIND, payload.clone())).await.map_err(SyncError::from)
            }
            Err(err) => Err(SyncError::from(err)),
        };

        let remote = match created.and_then(|value| decode::<E>(value).map_err(|(_, err)| err)) {
            Ok(remote) => remote,
            Err(err) => return self.fail_record(record, label, err).await,
        };
        let Some(rid) = remote.remote_id() else {
            let err = SyncError::Decode(format!("created {} has no id", E::KIND));
            return self.fail_record(record, label, err).await;
        };

        self.ctx.register(E::KIND, record.id, rid);
        record.mark_synced(rid, remote.modified_at(), E::to_local(&remote, &self.ctx));
        if self.persist(&record, &label).await {
            self.outcome.created_remote += 1;
        }
        tracing::debug!(store_id = %self.store_id, kind = %E::KIND, record_id = %record.id, remote_id = %rid, "Created remotely");
        Ok(())
    }

    async fn reconcile_pair(&mut self, mut record: LocalRecord<E::Data>, remote: &E::Remote, linked: bool) -> Result<(), SyncError> {
        let push = match remote.modified_at() {
            Some(modified) => record.updated_at > modified,
            // Without a remote clock only unsynced local edits go out.
            None => !linked && record.sync_status != RecordSyncStatus::Synced,
        };
        if push {
            return self.push(record, remote).await;
        }

        let data = E::to_local(remote, &self.ctx);
        let changed = record.pull(data, remote.modified_at());
        if changed || linked {
            let label = E::label(&record.data);
            if self.persist(&record, &label).await {
                self.outcome.pulled += 1;
            }
        } else {
            self.outcome.unchanged += 1;
        }
        Ok(())
    }

    async fn push(&mut self, record: LocalRecord<E::Data>, remote: &E::Remote) -> Result<(), SyncError> {
        let label = E::label(&record.data);
        let Some(rid) = remote.remote_id() else {
            return Ok(());
        };
        let updated = match serde_json::to_value(E::to_remote_update(&record.data, &self.ctx)) {
            Ok(payload) => {
                let adapter = self.adapter.clone();
                self.call(|| adapter.update(E::KIND, rid, payload.clone())).await
            }
            Err(err) => return self.fail_record(record, label, err.into()).await,
        };

        match updated {
            Ok(value) => match decode::<E>(value) {
                Ok(returned) => {
                    let mut record = record;
                    record.mark_synced(rid, returned.modified_at(), E::to_local(&returned, &self.ctx));
                    if self.persist(&record, &label).await {
                        self.outcome.pushed += 1;
                    }
                    Ok(())
                }
                Err((_, err)) => self.fail_record(record, label, err).await,
            },
            Err(RemoteError::NotFound(_)) => {
                self.recover_orphan(record).await;
                Ok(())
            }
            Err(err) => self.fail_record(record, label, err.into()).await,
        }
    }

    async fn recover_orphan(&mut self, mut record: LocalRecord<E::Data>) {
        let label = E::label(&record.data);
        tracing::info!(store_id = %self.store_id, kind = %E::KIND, record_id = %record.id, remote_id = ?record.remote_id, "Remote record gone, clearing link");
        self.ctx.forget(E::KIND, record.id);
        record.orphan();
        if self.persist(&record, &label).await {
            self.outcome.orphaned += 1;
        }
    }

    /// Imported records were mapped before the local pass; references to
    /// records linked or created later in the pass resolve now.
    async fn remap_imports(&mut self, imported: Vec<LocalRecord<E::Data>>, remotes: &HashMap<RemoteId, E::Remote>) {
        for mut record in imported {
            let Some(remote) = record.remote_id.and_then(|rid| remotes.get(&rid)) else { continue };
            let data = E::to_local(remote, &self.ctx);
            if data == record.data {
                continue;
            }
            record.data = data;
            let label = E::label(&record.data);
            self.persist(&record, &label).await;
        }
    }

    /// Marks the record failed. Phase-fatal errors are returned to abort the phase.
    async fn fail_record(&mut self, mut record: LocalRecord<E::Data>, label: String, err: SyncError) -> Result<(), SyncError> {
        if err.is_phase_fatal() {
            return Err(err);
        }
        tracing::warn!(store_id = %self.store_id, kind = %E::KIND, record_id = %record.id, error = %err, "Record sync failed");
        self.outcome.record_failure(&label, &err);
        record.mark_failed();
        if let Err(write_err) = self.repo.update(&record).await {
            tracing::warn!(store_id = %self.store_id, kind = %E::KIND, record_id = %record.id, error = %write_err, "Could not mark record failed");
        }
        Ok(())
    }

    /// Writes one record. A storage failure is a record failure.
    async fn persist(&mut self, record: &LocalRecord<E::Data>, label: &str) -> bool {
        match self.repo.update(record).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(store_id = %self.store_id, kind = %E::KIND, record_id = %record.id, error = %err, "Record write failed");
                self.outcome.record_failure(label, &err);
                false
            }
        }
    }
}

fn decode<E: SyncEntity>(value: Value) -> Result<E::Remote, (String, SyncError)> {
    let label = match value.get("id") {
        Some(id) => format!("{} {id}", E::KIND),
        None => format!("{} <no id>", E::KIND),
    };
    let remote: E::Remote = serde_json::from_value(value).map_err(|e| (label.clone(), SyncError::from(e)))?;
    if remote.remote_id().is_none() {
        return Err((label, SyncError::Decode(format!("{} without a positive id", E::KIND))));
    }
    Ok(remote)
}

/// Orders records so every parent precedes its children.
fn sort_parents_first<E: SyncEntity>(records: &mut [LocalRecord<E::Data>]) {
    let parents: HashMap<Uuid, Uuid> = records
        .iter()
        .filter_map(|r| E::parent(&r.data).map(|p| (r.id, p)))
        .collect();
    let depth = |id: Uuid| {
        let mut depth = 0usize;
        let mut cursor = id;
        while let Some(parent) = parents.get(&cursor) {
            depth += 1;
            // Cycles end the walk.
            if depth > parents.len() {
                break;
            }
            cursor = *parent;
        }
        depth
    };
    records.sort_by_cached_key(|r| depth(r.id));
}
