//! Store Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::{EntityKind, PhaseStatus, Platform};

/// Tenant owning stores.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
}

impl Organization {
    pub fn new(name: impl Into<String>) -> Self {
        Self { id: Uuid::now_v7(), name: name.into(), is_active: true }
    }
}

/// Whether a sync run currently holds the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreSyncState {
    #[default]
    Idle,
    Running,
}

impl StoreSyncState {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Idle => "idle", Self::Running => "running" }
    }
}

pub type SyncStatusMap = BTreeMap<EntityKind, PhaseStatus>;

#[derive(Clone, Serialize, Deserialize)]
pub struct Store {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub platform: Platform,
    pub base_url: String,
    pub api_key: String,
    #[serde(skip_serializing)]
    pub api_secret: String,
    pub is_active: bool,
    pub last_sync_date: Option<DateTime<Utc>>,
    pub sync_state: StoreSyncState,
    pub sync_started_at: Option<DateTime<Utc>>,
    pub sync_status: SyncStatusMap,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Store {
    pub fn create(organization_id: Uuid, name: impl Into<String>, platform: Platform, base_url: impl Into<String>, api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), organization_id, name: name.into(), platform,
            base_url: base_url.into(), api_key: api_key.into(), api_secret: api_secret.into(),
            is_active: true, last_sync_date: None, sync_state: StoreSyncState::Idle, sync_started_at: None,
            sync_status: SyncStatusMap::new(), created_at: now, updated_at: now,
        }
    }

    pub fn has_credentials(&self) -> bool {
        !self.base_url.trim().is_empty() && !self.api_key.trim().is_empty() && !self.api_secret.trim().is_empty()
    }

    /// Credentials present and the platform integrated: eligible for automatic sync.
    pub fn can_sync(&self) -> bool { self.is_active && self.has_credentials() && self.platform.is_supported() }

    /// Whether a new run may claim the store. A running claim older than
    /// `stale_before` belongs to a run that died without releasing it.
    pub fn is_claimable(&self, stale_before: DateTime<Utc>) -> bool {
        match self.sync_state {
            StoreSyncState::Idle => true,
            StoreSyncState::Running => self.sync_started_at.map_or(true, |t| t < stale_before),
        }
    }

    pub fn status(&self) -> StoreSyncStatus {
        StoreSyncStatus {
            store_id: self.id,
            state: self.sync_state,
            phases: self.sync_status.clone(),
            last_sync_date: self.last_sync_date,
            sync_started_at: self.sync_started_at,
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.id)
            .field("organization_id", &self.organization_id)
            .field("name", &self.name)
            .field("platform", &self.platform)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("is_active", &self.is_active)
            .field("sync_state", &self.sync_state)
            .field("sync_status", &self.sync_status)
            .finish()
    }
}

/// Read model returned by status queries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreSyncStatus {
    pub store_id: Uuid,
    pub state: StoreSyncState,
    pub phases: SyncStatusMap,
    pub last_sync_date: Option<DateTime<Utc>>,
    pub sync_started_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn store() -> Store {
        Store::create(Uuid::new_v4(), "Main", Platform::WooCommerce, "https://shop.test", "ck_1", "cs_1")
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", store());
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("cs_1"));
    }

    #[test]
    fn test_stale_claim_is_claimable() {
        let mut s = store();
        let now = Utc::now();
        s.sync_state = StoreSyncState::Running;
        s.sync_started_at = Some(now - Duration::hours(3));
        assert!(s.is_claimable(now - Duration::hours(2)));
        s.sync_started_at = Some(now);
        assert!(!s.is_claimable(now - Duration::hours(2)));
    }

    #[test]
    fn test_can_sync_requires_supported_platform() {
        let mut s = store();
        assert!(s.can_sync());
        s.platform = Platform::Shopify;
        assert!(!s.can_sync());
        s.platform = Platform::WooCommerce;
        s.api_secret.clear();
        assert!(!s.can_sync());
    }
}
