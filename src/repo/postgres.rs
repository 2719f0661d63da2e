//! Postgres repositories (sqlx).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use std::marker::PhantomData;
use uuid::Uuid;

use super::{EntityRepository, OrganizationRepository, StoreRepository};
use crate::domain::aggregates::{LocalRecord, Organization, Store, StoreSyncState, SyncStatusMap};
use crate::domain::value_objects::RemoteId;
use crate::mapper::SyncEntity;
use crate::{EntityKind, PhaseStatus, Platform, RecordSyncStatus, Result, SyncError};

#[derive(sqlx::FromRow)]
struct OrganizationRow { id: Uuid, name: String, is_active: bool }

#[derive(sqlx::FromRow)]
struct StoreRow {
    id: Uuid, organization_id: Uuid, name: String, platform: String, base_url: String,
    api_key: String, api_secret: String, is_active: bool, last_sync_date: Option<DateTime<Utc>>,
    sync_state: String, sync_started_at: Option<DateTime<Utc>>, sync_status: Json<SyncStatusMap>,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl TryFrom<StoreRow> for Store {
    type Error = SyncError;

    fn try_from(row: StoreRow) -> Result<Self> {
        let platform = Platform::parse(&row.platform)
            .ok_or_else(|| SyncError::Decode(format!("unknown platform {:?} on store {}", row.platform, row.id)))?;
        let sync_state = match row.sync_state.as_str() {
            "running" => StoreSyncState::Running,
            _ => StoreSyncState::Idle,
        };
        Ok(Store {
            id: row.id, organization_id: row.organization_id, name: row.name, platform,
            base_url: row.base_url, api_key: row.api_key, api_secret: row.api_secret,
            is_active: row.is_active, last_sync_date: row.last_sync_date, sync_state,
            sync_started_at: row.sync_started_at, sync_status: row.sync_status.0,
            created_at: row.created_at, updated_at: row.updated_at,
        })
    }
}

const STORE_COLUMNS: &str = "id, organization_id, name, platform, base_url, api_key, api_secret, is_active, last_sync_date, sync_state, sync_started_at, sync_status, created_at, updated_at";

/// Organizations and stores.
#[derive(Clone)]
pub struct PgTenants {
    db: PgPool,
}

impl PgTenants {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

#[async_trait]
impl OrganizationRepository for PgTenants {
    async fn find_organization(&self, id: Uuid) -> Result<Option<Organization>> {
        let row = sqlx::query_as::<_, OrganizationRow>("SELECT id, name, is_active FROM organizations WHERE id = $1")
            .bind(id).fetch_optional(&self.db).await?;
        Ok(row.map(|r| Organization { id: r.id, name: r.name, is_active: r.is_active }))
    }
}

#[async_trait]
impl StoreRepository for PgTenants {
    async fn find_store(&self, id: Uuid) -> Result<Option<Store>> {
        let row = sqlx::query_as::<_, StoreRow>(&format!("SELECT {STORE_COLUMNS} FROM stores WHERE id = $1"))
            .bind(id).fetch_optional(&self.db).await?;
        row.map(Store::try_from).transpose()
    }

    async fn insert_store(&self, store: &Store) -> Result<()> {
        sqlx::query(&format!("INSERT INTO stores ({STORE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"))
            .bind(store.id).bind(store.organization_id).bind(&store.name).bind(store.platform.as_str())
            .bind(&store.base_url).bind(&store.api_key).bind(&store.api_secret).bind(store.is_active)
            .bind(store.last_sync_date).bind(store.sync_state.as_str()).bind(store.sync_started_at)
            .bind(Json(&store.sync_status)).bind(store.created_at).bind(store.updated_at)
            .execute(&self.db).await?;
        Ok(())
    }

    async fn try_claim_sync(&self, id: Uuid, kinds: &[EntityKind], stale_before: DateTime<Utc>) -> Result<bool> {
        let reset: SyncStatusMap = kinds.iter().map(|k| (*k, PhaseStatus::Pending)).collect();
        let claimed: Option<(Uuid,)> = sqlx::query_as(
            "UPDATE stores SET sync_state = 'running', sync_started_at = NOW(), sync_status = sync_status || $2, updated_at = NOW() \
             WHERE id = $1 AND (sync_state <> 'running' OR sync_started_at IS NULL OR sync_started_at < $3) RETURNING id",
        )
        .bind(id).bind(Json(&reset)).bind(stale_before)
        .fetch_optional(&self.db).await?;
        Ok(claimed.is_some())
    }

    async fn set_phase_status(&self, id: Uuid, kind: EntityKind, status: PhaseStatus) -> Result<()> {
        sqlx::query("UPDATE stores SET sync_status = jsonb_set(sync_status, ARRAY[$2::text], to_jsonb($3::text), true), updated_at = NOW() WHERE id = $1")
            .bind(id).bind(kind.as_str()).bind(status.as_str())
            .execute(&self.db).await?;
        Ok(())
    }

    async fn release_sync(&self, id: Uuid, finished_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE stores SET sync_state = 'idle', last_sync_date = $2, updated_at = NOW() WHERE id = $1")
            .bind(id).bind(finished_at)
            .execute(&self.db).await?;
        Ok(())
    }

    async fn list_due_for_sync(&self, synced_before: DateTime<Utc>) -> Result<Vec<Store>> {
        let rows = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM stores WHERE is_active AND sync_state = 'idle' \
             AND (last_sync_date IS NULL OR last_sync_date < $1) ORDER BY last_sync_date NULLS FIRST"
        ))
        .bind(synced_before).fetch_all(&self.db).await?;
        rows.into_iter().map(Store::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct EntityRow {
    id: Uuid, organization_id: Uuid, store_id: Uuid, remote_id: Option<i64>, sync_status: String,
    last_synced_at: Option<DateTime<Utc>>, is_active: bool, created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>, data: Json<Value>,
}

const ENTITY_COLUMNS: &str = "id, organization_id, store_id, remote_id, sync_status, last_synced_at, is_active, created_at, updated_at, data";

/// One entity table; the payload lives in a JSONB `data` column.
pub struct PgEntities<E> {
    db: PgPool,
    _kind: PhantomData<fn() -> E>,
}

impl<E: SyncEntity> PgEntities<E> {
    pub fn new(db: PgPool) -> Self { Self { db, _kind: PhantomData } }

    fn table() -> &'static str { E::KIND.table() }

    fn decode(row: EntityRow) -> Result<LocalRecord<E::Data>> {
        let sync_status = RecordSyncStatus::parse(&row.sync_status)
            .ok_or_else(|| SyncError::Decode(format!("unknown sync status {:?} on {} {}", row.sync_status, E::KIND, row.id)))?;
        Ok(LocalRecord {
            id: row.id, organization_id: row.organization_id, store_id: row.store_id,
            remote_id: row.remote_id.and_then(RemoteId::new), sync_status,
            last_synced_at: row.last_synced_at, is_active: row.is_active,
            created_at: row.created_at, updated_at: row.updated_at,
            data: serde_json::from_value(row.data.0)?,
        })
    }
}

#[async_trait]
impl<E: SyncEntity> EntityRepository<E> for PgEntities<E> {
    async fn list_for_store(&self, store_id: Uuid, organization_id: Uuid) -> Result<Vec<LocalRecord<E::Data>>> {
        let rows = sqlx::query_as::<_, EntityRow>(&format!(
            "SELECT {ENTITY_COLUMNS} FROM {} WHERE store_id = $1 AND organization_id = $2 ORDER BY created_at, id",
            Self::table()
        ))
        .bind(store_id).bind(organization_id).fetch_all(&self.db).await?;
        rows.into_iter().map(Self::decode).collect()
    }

    async fn insert(&self, record: &LocalRecord<E::Data>) -> Result<()> {
        let data = serde_json::to_value(&record.data)?;
        sqlx::query(&format!("INSERT INTO {} ({ENTITY_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)", Self::table()))
            .bind(record.id).bind(record.organization_id).bind(record.store_id)
            .bind(record.remote_id.map(|r| r.value())).bind(record.sync_status.as_str())
            .bind(record.last_synced_at).bind(record.is_active).bind(record.created_at)
            .bind(record.updated_at).bind(Json(data))
            .execute(&self.db).await?;
        Ok(())
    }

    async fn update(&self, record: &LocalRecord<E::Data>) -> Result<()> {
        let data = serde_json::to_value(&record.data)?;
        let done = sqlx::query(&format!(
            "UPDATE {} SET remote_id = $2, sync_status = $3, last_synced_at = $4, is_active = $5, updated_at = $6, data = $7 WHERE id = $1",
            Self::table()
        ))
        .bind(record.id).bind(record.remote_id.map(|r| r.value())).bind(record.sync_status.as_str())
        .bind(record.last_synced_at).bind(record.is_active).bind(record.updated_at).bind(Json(data))
        .execute(&self.db).await?;
        if done.rows_affected() == 0 {
            return Err(SyncError::Storage(format!("{} {} not found", E::KIND, record.id)));
        }
        Ok(())
    }

    async fn remote_index(&self, store_id: Uuid) -> Result<Vec<(Uuid, RemoteId)>> {
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(&format!(
            "SELECT id, remote_id FROM {} WHERE store_id = $1 AND remote_id IS NOT NULL",
            Self::table()
        ))
        .bind(store_id).fetch_all(&self.db).await?;
        Ok(rows.into_iter().filter_map(|(id, rid)| RemoteId::new(rid).map(|r| (id, r))).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = include_str!("../../migrations/20240101000000_store_sync.sql");

    fn table_definition(table: &str) -> &'static str {
        let head = format!("CREATE TABLE IF NOT EXISTS {table} (");
        let start = SCHEMA.find(&head).unwrap_or_else(|| panic!("{table} is not created"));
        let rest = &SCHEMA[start..];
        &rest[..rest.find(");").unwrap()]
    }

    #[test]
    fn test_entity_tables_belong_to_their_tenant() {
        for kind in EntityKind::ALL {
            let definition = table_definition(kind.table());
            assert!(definition.contains("organization_id UUID NOT NULL REFERENCES organizations(id)"), "{kind}");
            assert!(definition.contains("store_id UUID NOT NULL REFERENCES stores(id)"), "{kind}");
            assert!(definition.contains("id UUID PRIMARY KEY"), "{kind}");
        }
    }
}
