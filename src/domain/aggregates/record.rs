//! Synced local record
//!
//! Every local entity (category, product, customer, order) is a
//! `LocalRecord` around its domain payload. The wrapper owns the sync
//! metadata: remote id, sync status and timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::RemoteId;
use crate::RecordSyncStatus;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalRecord<P> {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub store_id: Uuid,
    pub remote_id: Option<RemoteId>,
    pub sync_status: RecordSyncStatus,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub data: P,
}

impl<P: PartialEq> LocalRecord<P> {
    /// A record created by normal CRUD; not yet known remotely.
    pub fn create(organization_id: Uuid, store_id: Uuid, data: P) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), organization_id, store_id, remote_id: None,
            sync_status: RecordSyncStatus::Pending, last_synced_at: None, is_active: true,
            created_at: now, updated_at: now, data,
        }
    }

    /// A record constructed from a remote record during sync.
    pub fn import(organization_id: Uuid, store_id: Uuid, remote_id: RemoteId, remote_modified: Option<DateTime<Utc>>, data: P) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), organization_id, store_id, remote_id: Some(remote_id),
            sync_status: RecordSyncStatus::Synced, last_synced_at: Some(now), is_active: true,
            created_at: now, updated_at: remote_modified.unwrap_or(now), data,
        }
    }

    /// Local edit: the change has to be pushed on the next sync.
    pub fn edit(&mut self, data: P) {
        self.data = data;
        self.sync_status = RecordSyncStatus::Pending;
        self.updated_at = Utc::now();
    }

    pub fn deactivate(&mut self) { self.is_active = false; self.updated_at = Utc::now(); }

    /// Records a successful create/push. `updated_at` follows the remote
    /// modification time so the next pass sees the two sides as equal.
    pub fn mark_synced(&mut self, remote_id: RemoteId, remote_modified: Option<DateTime<Utc>>, data: P) {
        self.remote_id = Some(remote_id);
        self.data = data;
        self.sync_status = RecordSyncStatus::Synced;
        self.last_synced_at = Some(Utc::now());
        if let Some(modified) = remote_modified { self.updated_at = modified; }
    }

    pub fn mark_failed(&mut self) { self.sync_status = RecordSyncStatus::Failed; }

    /// Applies remote state. Returns whether anything observable changed.
    pub fn pull(&mut self, data: P, remote_modified: Option<DateTime<Utc>>) -> bool {
        let data_changed = self.data != data;
        let status_changed = self.sync_status != RecordSyncStatus::Synced;
        let stamp_changed = remote_modified.is_some_and(|m| m != self.updated_at);
        if !(data_changed || status_changed || stamp_changed) { return false; }
        self.data = data;
        self.sync_status = RecordSyncStatus::Synced;
        self.last_synced_at = Some(Utc::now());
        if let Some(modified) = remote_modified { self.updated_at = modified; }
        true
    }

    /// The remote counterpart disappeared: forget it and wait for the next pass.
    pub fn orphan(&mut self) {
        self.remote_id = None;
        self.sync_status = RecordSyncStatus::Pending;
    }

    pub fn link(&mut self, remote_id: RemoteId) { self.remote_id = Some(remote_id); }

    pub fn is_synced(&self) -> bool { self.sync_status == RecordSyncStatus::Synced }
}
