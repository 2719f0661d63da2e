//! Platform capability seam.
//!
//! The sync core talks to remote platforms only through
//! [`RemotePlatformAdapter`]; the adapter is picked by the store's platform.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::client::{ClientOptions, Credentials, RemoteClient};
use super::error::RemoteError;
use super::woocommerce::WooCommerceAdapter;
use crate::domain::aggregates::Store;
use crate::domain::value_objects::RemoteId;
use crate::{EntityKind, Platform, SyncError};

/// One page of a remote collection.
#[derive(Debug, Clone, Default)]
pub struct RemotePage {
    pub items: Vec<Value>,
    /// Total page count when the platform advertises it.
    pub total_pages: Option<u32>,
}

#[async_trait]
pub trait RemotePlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Fetches page `page` (1-based) of the collection for `kind`.
    async fn fetch_page(&self, kind: EntityKind, page: u32, per_page: u32) -> Result<RemotePage, RemoteError>;

    /// Creates a record and returns the platform's representation of it.
    async fn create(&self, kind: EntityKind, payload: Value) -> Result<Value, RemoteError>;

    async fn update(&self, kind: EntityKind, remote_id: RemoteId, payload: Value) -> Result<Value, RemoteError>;

    async fn delete(&self, kind: EntityKind, remote_id: RemoteId) -> Result<(), RemoteError>;
}

/// Builds the adapter for a store.
pub trait AdapterFactory: Send + Sync {
    fn adapter_for(&self, store: &Store) -> Result<Arc<dyn RemotePlatformAdapter>, SyncError>;
}

/// Production factory: one throttled client per store.
#[derive(Debug, Clone, Default)]
pub struct PlatformAdapters {
    options: ClientOptions,
}

impl PlatformAdapters {
    pub fn new(options: ClientOptions) -> Self { Self { options } }
}

impl AdapterFactory for PlatformAdapters {
    fn adapter_for(&self, store: &Store) -> Result<Arc<dyn RemotePlatformAdapter>, SyncError> {
        match store.platform {
            Platform::WooCommerce => {
                let credentials = Credentials {
                    base_url: store.base_url.clone(),
                    key: store.api_key.clone(),
                    secret: store.api_secret.clone(),
                };
                let client = RemoteClient::new(credentials, &self.options)?;
                Ok(Arc::new(WooCommerceAdapter::new(client)))
            }
            other => Err(SyncError::UnsupportedPlatform(other)),
        }
    }
}
