//! In-process repositories for tests and local development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{EntityRepository, OrganizationRepository, Repositories, StoreRepository};
use crate::domain::aggregates::{LocalRecord, Organization, Store, StoreSyncState};
use crate::domain::value_objects::RemoteId;
use crate::mapper::{Categories, Customers, Orders, Products, SyncEntity};
use crate::{EntityKind, PhaseStatus, Result, SyncError};

#[derive(Default)]
pub struct MemoryTenants {
    organizations: RwLock<HashMap<Uuid, Organization>>,
    stores: RwLock<HashMap<Uuid, Store>>,
}

impl MemoryTenants {
    pub fn new() -> Self { Self::default() }

    pub async fn add_organization(&self, organization: Organization) {
        self.organizations.write().await.insert(organization.id, organization);
    }

    pub async fn add_store(&self, store: Store) {
        self.stores.write().await.insert(store.id, store);
    }
}

#[async_trait]
impl OrganizationRepository for MemoryTenants {
    async fn find_organization(&self, id: Uuid) -> Result<Option<Organization>> {
        Ok(self.organizations.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl StoreRepository for MemoryTenants {
    async fn find_store(&self, id: Uuid) -> Result<Option<Store>> {
        Ok(self.stores.read().await.get(&id).cloned())
    }

    async fn insert_store(&self, store: &Store) -> Result<()> {
        let mut stores = self.stores.write().await;
        if stores.contains_key(&store.id) {
            return Err(SyncError::Storage(format!("store {} already exists", store.id)));
        }
        stores.insert(store.id, store.clone());
        Ok(())
    }

    async fn try_claim_sync(&self, id: Uuid, kinds: &[EntityKind], stale_before: DateTime<Utc>) -> Result<bool> {
        let mut stores = self.stores.write().await;
        let store = stores.get_mut(&id).ok_or(SyncError::StoreNotFound(id))?;
        if !store.is_claimable(stale_before) {
            return Ok(false);
        }
        store.sync_state = StoreSyncState::Running;
        store.sync_started_at = Some(Utc::now());
        for kind in kinds {
            store.sync_status.insert(*kind, PhaseStatus::Pending);
        }
        Ok(true)
    }

    async fn set_phase_status(&self, id: Uuid, kind: EntityKind, status: PhaseStatus) -> Result<()> {
        let mut stores = self.stores.write().await;
        let store = stores.get_mut(&id).ok_or(SyncError::StoreNotFound(id))?;
        store.sync_status.insert(kind, status);
        Ok(())
    }

    async fn release_sync(&self, id: Uuid, finished_at: DateTime<Utc>) -> Result<()> {
        let mut stores = self.stores.write().await;
        let store = stores.get_mut(&id).ok_or(SyncError::StoreNotFound(id))?;
        store.sync_state = StoreSyncState::Idle;
        store.last_sync_date = Some(finished_at);
        Ok(())
    }

    async fn list_due_for_sync(&self, synced_before: DateTime<Utc>) -> Result<Vec<Store>> {
        let stores = self.stores.read().await;
        Ok(stores
            .values()
            .filter(|s| s.is_active && s.sync_state == StoreSyncState::Idle)
            .filter(|s| s.last_sync_date.map_or(true, |t| t < synced_before))
            .cloned()
            .collect())
    }
}

/// Records of one entity kind, kept in insertion order.
pub struct MemoryEntities<E: SyncEntity> {
    records: RwLock<Vec<LocalRecord<E::Data>>>,
}

impl<E: SyncEntity> Default for MemoryEntities<E> {
    fn default() -> Self { Self { records: RwLock::new(Vec::new()) } }
}

impl<E: SyncEntity> MemoryEntities<E> {
    pub fn new() -> Self { Self::default() }

    pub async fn all(&self) -> Vec<LocalRecord<E::Data>> { self.records.read().await.clone() }

    pub async fn get(&self, id: Uuid) -> Option<LocalRecord<E::Data>> {
        self.records.read().await.iter().find(|r| r.id == id).cloned()
    }

    pub async fn len(&self) -> usize { self.records.read().await.len() }

    pub async fn is_empty(&self) -> bool { self.records.read().await.is_empty() }
}

fn remote_id_taken<P>(records: &[LocalRecord<P>], record: &LocalRecord<P>) -> bool {
    record.remote_id.is_some_and(|rid| {
        records.iter().any(|r| r.id != record.id && r.store_id == record.store_id && r.remote_id == Some(rid))
    })
}

#[async_trait]
impl<E: SyncEntity> EntityRepository<E> for MemoryEntities<E> {
    async fn list_for_store(&self, store_id: Uuid, organization_id: Uuid) -> Result<Vec<LocalRecord<E::Data>>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.store_id == store_id && r.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn insert(&self, record: &LocalRecord<E::Data>) -> Result<()> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.id == record.id) {
            return Err(SyncError::Storage(format!("{} {} already exists", E::KIND, record.id)));
        }
        if remote_id_taken(&records, record) {
            return Err(SyncError::Storage(format!("duplicate remote id for {} in store {}", E::KIND, record.store_id)));
        }
        records.push(record.clone());
        Ok(())
    }

    async fn update(&self, record: &LocalRecord<E::Data>) -> Result<()> {
        let mut records = self.records.write().await;
        if remote_id_taken(&records, record) {
            return Err(SyncError::Storage(format!("duplicate remote id for {} in store {}", E::KIND, record.store_id)));
        }
        let slot = records
            .iter_mut()
            .find(|r| r.id == record.id)
            .ok_or_else(|| SyncError::Storage(format!("{} {} not found", E::KIND, record.id)))?;
        *slot = record.clone();
        Ok(())
    }

    async fn remote_index(&self, store_id: Uuid) -> Result<Vec<(Uuid, RemoteId)>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.store_id == store_id)
            .filter_map(|r| r.remote_id.map(|rid| (r.id, rid)))
            .collect())
    }
}

/// Concrete in-memory repositories, kept so callers can seed and inspect them.
#[derive(Clone, Default)]
pub struct MemoryRepositories {
    pub tenants: Arc<MemoryTenants>,
    pub categories: Arc<MemoryEntities<Categories>>,
    pub products: Arc<MemoryEntities<Products>>,
    pub customers: Arc<MemoryEntities<Customers>>,
    pub orders: Arc<MemoryEntities<Orders>>,
}

impl MemoryRepositories {
    pub fn new() -> Self { Self::default() }

    pub fn repositories(&self) -> Repositories {
        Repositories {
            organizations: self.tenants.clone(),
            stores: self.tenants.clone(),
            categories: self.categories.clone(),
            products: self.products.clone(),
            customers: self.customers.clone(),
            orders: self.orders.clone(),
        }
    }
}
