//! Persistence seams consumed by the sync core.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::aggregates::{LocalRecord, Organization, Store};
use crate::domain::value_objects::RemoteId;
use crate::mapper::{Categories, Customers, Orders, Products, SyncEntity};
use crate::{EntityKind, PhaseStatus, Result};

pub use memory::{MemoryEntities, MemoryRepositories, MemoryTenants};
pub use postgres::{PgEntities, PgTenants};

#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    async fn find_organization(&self, id: Uuid) -> Result<Option<Organization>>;
}

#[async_trait]
pub trait StoreRepository: Send + Sync {
    async fn find_store(&self, id: Uuid) -> Result<Option<Store>>;

    async fn insert_store(&self, store: &Store) -> Result<()>;

    /// Atomically moves the store from idle to running, resetting `kinds`
    /// to pending. A running claim started before `stale_before` is taken
    /// over. Returns `false` when another run holds the store.
    async fn try_claim_sync(&self, id: Uuid, kinds: &[EntityKind], stale_before: DateTime<Utc>) -> Result<bool>;

    async fn set_phase_status(&self, id: Uuid, kind: EntityKind, status: PhaseStatus) -> Result<()>;

    /// Returns the store to idle and stamps the last sync date.
    async fn release_sync(&self, id: Uuid, finished_at: DateTime<Utc>) -> Result<()>;

    /// Active, idle stores whose last sync is older than `synced_before`.
    async fn list_due_for_sync(&self, synced_before: DateTime<Utc>) -> Result<Vec<Store>>;
}

#[async_trait]
pub trait EntityRepository<E: SyncEntity>: Send + Sync {
    /// Active and inactive records of one store, oldest first.
    async fn list_for_store(&self, store_id: Uuid, organization_id: Uuid) -> Result<Vec<LocalRecord<E::Data>>>;

    async fn insert(&self, record: &LocalRecord<E::Data>) -> Result<()>;

    async fn update(&self, record: &LocalRecord<E::Data>) -> Result<()>;

    /// `(local id, remote id)` pairs for records linked to the remote side.
    async fn remote_index(&self, store_id: Uuid) -> Result<Vec<(Uuid, RemoteId)>>;
}

/// Every repository the orchestrator needs.
#[derive(Clone)]
pub struct Repositories {
    pub organizations: Arc<dyn OrganizationRepository>,
    pub stores: Arc<dyn StoreRepository>,
    pub categories: Arc<dyn EntityRepository<Categories>>,
    pub products: Arc<dyn EntityRepository<Products>>,
    pub customers: Arc<dyn EntityRepository<Customers>>,
    pub orders: Arc<dyn EntityRepository<Orders>>,
}

impl Repositories {
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        let tenants = Arc::new(PgTenants::new(pool.clone()));
        Self {
            organizations: tenants.clone(),
            stores: tenants,
            categories: Arc::new(PgEntities::<Categories>::new(pool.clone())),
            products: Arc::new(PgEntities::<Products>::new(pool.clone())),
            customers: Arc::new(PgEntities::<Customers>::new(pool.clone())),
            orders: Arc::new(PgEntities::<Orders>::new(pool)),
        }
    }

    pub async fn remote_index(&self, kind: EntityKind, store_id: Uuid) -> Result<Vec<(Uuid, RemoteId)>> {
        match kind {
            EntityKind::Category => self.categories.remote_index(store_id).await,
            EntityKind::Product => self.products.remote_index(store_id).await,
            EntityKind::Customer => self.customers.remote_index(store_id).await,
            EntityKind::Order => self.orders.remote_index(store_id).await,
        }
    }
}
