use async_trait::async_trait;
use serde_json::Value;

use super::adapter::{RemotePage, RemotePlatformAdapter};
use super::client::RemoteClient;
use super::error::RemoteError;
use crate::domain::value_objects::RemoteId;
use crate::{EntityKind, Platform};

/// WooCommerce REST v3 adapter.
pub struct WooCommerceAdapter {
    client: RemoteClient,
}

impl WooCommerceAdapter {
    pub fn new(client: RemoteClient) -> Self { Self { client } }

    pub fn resource(kind: EntityKind) -> &'static str {
        match kind {
            EntityKind::Category => "products/categories",
            EntityKind::Product => "products",
            EntityKind::Customer => "customers",
            EntityKind::Order => "orders",
        }
    }

    fn list_query(kind: EntityKind, page: u32, per_page: u32) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("page", page.to_string()),
            ("per_page", per_page.to_string()),
            ("orderby", "id".to_string()),
            ("order", "asc".to_string()),
        ];
        // The customers endpoint lists only the "customer" role by default.
        if kind == EntityKind::Customer {
            query.push(("role", "all".to_string()));
        }
        query
    }
}

#[async_trait]
impl RemotePlatformAdapter for WooCommerceAdapter {
    fn platform(&self) -> Platform { Platform::WooCommerce }

    async fn fetch_page(&self, kind: EntityKind, page: u32, per_page: u32) -> Result<RemotePage, RemoteError> {
        let response = self.client.get(Self::resource(kind), &Self::list_query(kind, page, per_page)).await?;
        match response.body {
            Value::Array(items) => Ok(RemotePage { items, total_pages: response.total_pages }),
            other => Err(RemoteError::Decode(format!("expected a list of {kind} records, got {other}"))),
        }
    }

    async fn create(&self, kind: EntityKind, payload: Value) -> Result<Value, RemoteError> {
        Ok(self.client.post(Self::resource(kind), &payload).await?.body)
    }

    async fn update(&self, kind: EntityKind, remote_id: RemoteId, payload: Value) -> Result<Value, RemoteError> {
        let path = format!("{}/{}", Self::resource(kind), remote_id);
        Ok(self.client.put(&path, &payload).await?.body)
    }

    async fn delete(&self, kind: EntityKind, remote_id: RemoteId) -> Result<(), RemoteError> {
        let path = format!("{}/{}", Self::resource(kind), remote_id);
        self.client.delete(&path).await.map(|_| ())
    }
}
