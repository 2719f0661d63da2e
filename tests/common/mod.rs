//! Shared fixtures: an in-process fake of the remote platform, a recording
//! audit sink and a harness wiring them to the in-memory repositories.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use uuid::Uuid;

use opensase_storesync::audit::{AuditEntry, AuditError, AuditSink};
use opensase_storesync::domain::aggregates::{Organization, Store};
use opensase_storesync::domain::value_objects::RemoteId;
use opensase_storesync::remote::{AdapterFactory, RemotePage, RemotePlatformAdapter};
use opensase_storesync::repo::MemoryRepositories;
use opensase_storesync::sync::{ExecutorSettings, OrchestratorSettings, SyncOrchestrator};
use opensase_storesync::worker::BackgroundRunner;
use opensase_storesync::{EntityKind, Platform, RemoteError, SyncError};

pub fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

pub fn gmt(at: DateTime<Utc>) -> String { at.format("%Y-%m-%dT%H:%M:%S").to_string() }

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub op: &'static str,
    pub kind: EntityKind,
    pub page: Option<u32>,
    pub remote_id: Option<i64>,
}

#[derive(Default)]
struct FakeState {
    records: HashMap<EntityKind, BTreeMap<i64, Value>>,
    next_id: i64,
    clock: Option<DateTime<Utc>>,
    calls: Vec<Call>,
    page_errors: HashMap<(EntityKind, u32), RemoteError>,
    kind_errors: HashMap<EntityKind, RemoteError>,
    write_errors: HashMap<(EntityKind, String), RemoteError>,
    rate_limits: HashMap<EntityKind, u32>,
    panics: HashSet<EntityKind>,
    advertise_total_pages: bool,
    ignore_paging: bool,
}

/// In-memory remote platform speaking the WooCommerce record shapes.
#[derive(Clone)]
pub struct FakeRemote {
    state: Arc<Mutex<FakeState>>,
    gates: Arc<Mutex<HashMap<EntityKind, Arc<Semaphore>>>>,
    delays: Arc<Mutex<HashMap<EntityKind, Duration>>>,
}

impl Default for FakeRemote {
    fn default() -> Self { Self::new() }
}

impl FakeRemote {
    pub fn new() -> Self {
        let state = FakeState { next_id: 100, advertise_total_pages: true, ..Default::default() };
        Self { state: Arc::new(Mutex::new(state)), gates: Default::default(), delays: Default::default() }
    }

    fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    /// Inserts a record as the remote holds it. Returns its id.
    pub fn seed(&self, kind: EntityKind, mut record: Value) -> i64 {
        self.with(|s| {
            let id = match record.get("id").and_then(Value::as_i64) {
                Some(id) => id,
                None => {
                    s.next_id += 1;
                    record["id"] = json!(s.next_id);
                    s.next_id
                }
            };
            s.records.entry(kind).or_default().insert(id, record);
            id
        })
    }

    pub fn remove(&self, kind: EntityKind, id: i64) {
        self.with(|s| s.records.entry(kind).or_default().remove(&id));
    }

    pub fn records(&self, kind: EntityKind) -> Vec<Value> {
        self.with(|s| s.records.get(&kind).map(|m| m.values().cloned().collect()).unwrap_or_default())
    }

    pub fn record(&self, kind: EntityKind, id: i64) -> Option<Value> {
        self.with(|s| s.records.get(&kind).and_then(|m| m.get(&id)).cloned())
    }

    /// Time stamped on records the fake writes.
    pub fn set_clock(&self, at: DateTime<Utc>) { self.with(|s| s.clock = Some(at)); }

    pub fn calls(&self) -> Vec<Call> { self.with(|s| s.calls.clone()) }

    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.op != "list").collect()
    }

    pub fn clear_calls(&self) { self.with(|s| s.calls.clear()); }

    pub fn fail_page(&self, kind: EntityKind, page: u32, err: RemoteError) {
        self.with(|s| s.page_errors.insert((kind, page), err));
    }

    /// Every call for `kind` fails with `err`.
    pub fn fail_kind(&self, kind: EntityKind, err: RemoteError) {
        self.with(|s| s.kind_errors.insert(kind, err));
    }

    /// Creates/updates whose payload name (or email) matches fail with `err`.
    pub fn fail_write(&self, kind: EntityKind, name: &str, err: RemoteError) {
        self.with(|s| s.write_errors.insert((kind, name.to_string()), err));
    }

    /// The next `count` list calls for `kind` answer 429.
    pub fn rate_limit(&self, kind: EntityKind, count: u32) {
        self.with(|s| s.rate_limits.insert(kind, count));
    }

    pub fn panic_on(&self, kind: EntityKind) { self.with(|s| s.panics.insert(kind)); }

    pub fn hide_total_pages(&self) { self.with(|s| s.advertise_total_pages = false); }

    /// Every list call answers with the first page.
    pub fn ignore_paging(&self) { self.with(|s| s.ignore_paging = true); }

    pub fn delay(&self, kind: EntityKind, by: Duration) { self.delays.lock().unwrap().insert(kind, by); }

    /// List calls for `kind` wait until the returned semaphore gets a permit.
    pub fn gate(&self, kind: EntityKind) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.gates.lock().unwrap().insert(kind, gate.clone());
        gate
    }

    fn stamp(s: &mut FakeState, kind: EntityKind, record: &mut Value) {
        if kind == EntityKind::Category {
            return;
        }
        let now = s.clock.unwrap_or_else(|| ts(2024, 1, 1, 0, 0, 0));
        s.clock = Some(now + ChronoDuration::seconds(1));
        record["date_modified_gmt"] = json!(gmt(now));
    }

    fn write_error(s: &FakeState, kind: EntityKind, payload: &Value) -> Option<RemoteError> {
        let name = payload.get("name").or_else(|| payload.get("email")).and_then(Value::as_str)?;
        s.write_errors.get(&(kind, name.to_string())).cloned()
    }
}

fn merge(target: &mut Value, payload: Value) {
    if let (Some(target), Value::Object(fields)) = (target.as_object_mut(), payload) {
        for (key, value) in fields {
            target.insert(key, value);
        }
    }
}

#[async_trait]
impl RemotePlatformAdapter for FakeRemote {
    fn platform(&self) -> Platform { Platform::WooCommerce }

    async fn fetch_page(&self, kind: EntityKind, page: u32, per_page: u32) -> Result<RemotePage, RemoteError> {
        let gate = self.gates.lock().unwrap().get(&kind).cloned();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        let delay = self.delays.lock().unwrap().get(&kind).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        state.calls.push(Call { op: "list", kind, page: Some(page), remote_id: None });
        if state.panics.contains(&kind) {
            drop(state);
            panic!("fake remote exploded while listing {kind}");
        }
        if let Some(err) = state.kind_errors.get(&kind) {
            return Err(err.clone());
        }
        if let Some(left) = state.rate_limits.get_mut(&kind) {
            if *left > 0 {
                *left -= 1;
                return Err(RemoteError::RateLimit { retry_after: Some(Duration::from_millis(5)) });
            }
        }
        if let Some(err) = state.page_errors.get(&(kind, page)) {
            return Err(err.clone());
        }

        let all: Vec<Value> = state.records.get(&kind).map(|m| m.values().cloned().collect()).unwrap_or_default();
        let per_page = per_page.max(1) as usize;
        let total_pages = all.len().div_ceil(per_page).max(1) as u32;
        let offset = if state.ignore_paging { 0 } else { (page as usize - 1) * per_page };
        let items = all.into_iter().skip(offset).take(per_page).collect();
        Ok(RemotePage { items, total_pages: state.advertise_total_pages.then_some(total_pages) })
    }

    async fn create(&self, kind: EntityKind, payload: Value) -> Result<Value, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call { op: "create", kind, page: None, remote_id: None });
        if let Some(err) = state.kind_errors.get(&kind).cloned().or_else(|| FakeRemote::write_error(&state, kind, &payload)) {
            return Err(err);
        }
        state.next_id += 1;
        let id = state.next_id;
        let mut record = Value::Object(Map::new());
        merge(&mut record, payload);
        record["id"] = json!(id);
        FakeRemote::stamp(&mut state, kind, &mut record);
        state.records.entry(kind).or_default().insert(id, record.clone());
        Ok(record)
    }

    async fn update(&self, kind: EntityKind, remote_id: RemoteId, payload: Value) -> Result<Value, RemoteError> {
        let mut state = self.state.lock().unwrap();
        let id = remote_id.value();
        state.calls.push(Call { op: "update", kind, page: None, remote_id: Some(id) });
        if let Some(err) = state.kind_errors.get(&kind).cloned().or_else(|| FakeRemote::write_error(&state, kind, &payload)) {
            return Err(err);
        }
        let Some(mut record) = state.records.get(&kind).and_then(|m| m.get(&id)).cloned() else {
            return Err(RemoteError::NotFound(format!("{kind} {id}")));
        };
        merge(&mut record, payload);
        FakeRemote::stamp(&mut state, kind, &mut record);
        state.records.entry(kind).or_default().insert(id, record.clone());
        Ok(record)
    }

    async fn delete(&self, kind: EntityKind, remote_id: RemoteId) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call { op: "delete", kind, page: None, remote_id: Some(remote_id.value()) });
        match state.records.entry(kind).or_default().remove(&remote_id.value()) {
            Some(_) => Ok(()),
            None => Err(RemoteError::NotFound(format!("{kind} {}", remote_id.value()))),
        }
    }
}

impl AdapterFactory for FakeRemote {
    fn adapter_for(&self, store: &Store) -> Result<Arc<dyn RemotePlatformAdapter>, SyncError> {
        match store.platform {
            Platform::WooCommerce => Ok(Arc::new(self.clone())),
            other => Err(SyncError::UnsupportedPlatform(other)),
        }
    }
}

/// Keeps every audit entry; can be told to fail.
#[derive(Default)]
pub struct RecordingAudit {
    entries: Mutex<Vec<AuditEntry>>,
    failing: bool,
}

impl RecordingAudit {
    pub fn failing() -> Self { Self { entries: Mutex::new(Vec::new()), failing: true } }

    pub fn entries(&self) -> Vec<AuditEntry> { self.entries.lock().unwrap().clone() }

    pub fn names(&self) -> Vec<&'static str> { self.entries().iter().map(|e| e.event.name()).collect() }
}

#[async_trait]
impl AuditSink for RecordingAudit {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        self.entries.lock().unwrap().push(entry.clone());
        if self.failing {
            return Err(AuditError::Publish("audit bus down".into()));
        }
        Ok(())
    }
}

pub fn fast_settings() -> OrchestratorSettings {
    OrchestratorSettings {
        executor: ExecutorSettings { page_size: 100, rate_limit_retries: 2, retry_backoff: Duration::from_millis(5) },
        stale_lock: ChronoDuration::hours(2),
    }
}

pub struct Harness {
    pub mem: MemoryRepositories,
    pub remote: FakeRemote,
    pub audit: Arc<RecordingAudit>,
    pub orchestrator: SyncOrchestrator,
    pub organization: Organization,
    pub store: Store,
    pub actor: Uuid,
}

impl Harness {
    pub async fn new() -> Self { Self::with_audit(RecordingAudit::default()).await }

    pub async fn with_audit(audit: RecordingAudit) -> Self {
        let mem = MemoryRepositories::new();
        let remote = FakeRemote::new();
        let audit = Arc::new(audit);
        let organization = Organization::new("Acme");
        let store = Store::create(organization.id, "Acme Shop", Platform::WooCommerce, "https://shop.acme.test", "ck_test", "cs_test");
        mem.tenants.add_organization(organization.clone()).await;
        mem.tenants.add_store(store.clone()).await;
        let orchestrator = SyncOrchestrator::new(
            mem.repositories(),
            Arc::new(remote.clone()),
            audit.clone(),
            BackgroundRunner::new(4),
            fast_settings(),
        );
        Self { mem, remote, audit, orchestrator, organization, store, actor: Uuid::new_v4() }
    }
}
