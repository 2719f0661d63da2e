use async_trait::async_trait;

use super::{AuditEntry, AuditError, AuditSink};

pub const DEFAULT_AUDIT_SUBJECT: &str = "commerce.sync.audit";

/// Publishes entries as JSON on a NATS subject.
#[derive(Clone)]
pub struct NatsAuditSink {
    client: async_nats::Client,
    subject: String,
}

impl NatsAuditSink {
    pub fn new(client: async_nats::Client, subject: impl Into<String>) -> Self {
        Self { client, subject: subject.into() }
    }

    pub fn subject(&self) -> &str { &self.subject }
}

#[async_trait]
impl AuditSink for NatsAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let payload = serde_json::to_vec(entry)?;
        self.client
            .publish(self.subject.clone(), payload.into())
            .await
            .map_err(|e| AuditError::Publish(e.to_string()))
    }
}
