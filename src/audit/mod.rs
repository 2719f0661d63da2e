//! Audit trail of sync runs.
//!
//! Recording is best-effort: the orchestrator logs sink failures and moves on.

pub mod nats;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::events::SyncEvent;

pub use nats::NatsAuditSink;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub store_id: Uuid,
    pub organization_id: Uuid,
    pub actor_id: Uuid,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: SyncEvent,
}

impl AuditEntry {
    pub fn new(store_id: Uuid, organization_id: Uuid, actor_id: Uuid, event: SyncEvent) -> Self {
        Self { id: Uuid::now_v7(), store_id, organization_id, actor_id, at: Utc::now(), event }
    }
}

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("failed to encode audit entry: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to publish audit entry: {0}")]
    Publish(String),
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError>;
}

/// Writes entries to the log under the `audit` target.
#[derive(Debug, Clone, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let payload = serde_json::to_string(&entry.event)?;
        tracing::info!(
            target: "audit",
            event = entry.event.name(),
            store_id = %entry.store_id,
            organization_id = %entry.organization_id,
            actor_id = %entry.actor_id,
            payload = %payload,
            "Sync audit"
        );
        Ok(())
    }
}
