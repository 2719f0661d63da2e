//! Entity mapping between local records and remote shapes.
//!
//! Each entity type is bound to its local payload, remote record and
//! outbound payload through [`SyncEntity`]. All mapping functions are pure;
//! cross-entity references are translated through a read-only [`MapContext`].

pub mod category;
pub mod customer;
pub mod order;
pub mod product;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Debug;
use uuid::Uuid;

use crate::domain::value_objects::RemoteId;
use crate::remote::RemoteRecord;
use crate::EntityKind;

pub use category::Categories;
pub use customer::Customers;
pub use order::Orders;
pub use product::Products;

pub trait SyncEntity: Send + Sync + 'static {
    const KIND: EntityKind;

    /// Local domain payload.
    type Data: Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static;
    /// Record as the remote platform returns it.
    type Remote: RemoteRecord;
    /// Body sent on create/update.
    type Payload: Serialize;

    fn to_remote(data: &Self::Data, ctx: &MapContext) -> Self::Payload;

    /// Body sent when updating an existing remote record.
    fn to_remote_update(data: &Self::Data, ctx: &MapContext) -> Self::Payload {
        Self::to_remote(data, ctx)
    }

    fn to_local(remote: &Self::Remote, ctx: &MapContext) -> Self::Data;

    /// Human-readable identifier used in outcome errors.
    fn label(data: &Self::Data) -> String;

    /// Fallback identity for local records that have no remote id yet.
    fn natural_key(_data: &Self::Data) -> Option<String> { None }

    fn remote_natural_key(_remote: &Self::Remote) -> Option<String> { None }

    /// Local parent of the same kind; parents are pushed before children.
    fn parent(_data: &Self::Data) -> Option<Uuid> { None }
}

/// Local id <-> remote id pairs for one entity kind.
#[derive(Debug, Clone, Default)]
pub struct RemoteIndex {
    to_remote: HashMap<Uuid, RemoteId>,
    to_local: HashMap<RemoteId, Uuid>,
}

impl RemoteIndex {
    pub fn insert(&mut self, local: Uuid, remote: RemoteId) {
        if let Some(previous) = self.to_remote.insert(local, remote) {
            self.to_local.remove(&previous);
        }
        self.to_local.insert(remote, local);
    }

    pub fn remove(&mut self, local: Uuid) {
        if let Some(remote) = self.to_remote.remove(&local) {
            self.to_local.remove(&remote);
        }
    }

    pub fn len(&self) -> usize { self.to_remote.len() }
    pub fn is_empty(&self) -> bool { self.to_remote.is_empty() }
}

/// Read-only view the mappers use to translate references.
#[derive(Debug, Clone, Default)]
pub struct MapContext {
    indexes: HashMap<EntityKind, RemoteIndex>,
}

impl MapContext {
    pub fn new() -> Self { Self::default() }

    pub fn with_index(mut self, kind: EntityKind, pairs: impl IntoIterator<Item = (Uuid, RemoteId)>) -> Self {
        let index = self.indexes.entry(kind).or_default();
        for (local, remote) in pairs {
            index.insert(local, remote);
        }
        self
    }

    pub fn register(&mut self, kind: EntityKind, local: Uuid, remote: RemoteId) {
        self.indexes.entry(kind).or_default().insert(local, remote);
    }

    pub fn forget(&mut self, kind: EntityKind, local: Uuid) {
        if let Some(index) = self.indexes.get_mut(&kind) {
            index.remove(local);
        }
    }

    pub fn remote_id(&self, kind: EntityKind, local: Uuid) -> Option<RemoteId> {
        self.indexes.get(&kind)?.to_remote.get(&local).copied()
    }

    pub fn local_id(&self, kind: EntityKind, remote: RemoteId) -> Option<Uuid> {
        self.indexes.get(&kind)?.to_local.get(&remote).copied()
    }

    pub fn index_len(&self, kind: EntityKind) -> usize {
        self.indexes.get(&kind).map_or(0, RemoteIndex::len)
    }
}

/// Lowercased, trimmed key for case-insensitive matching.
pub(crate) fn fold_key(value: &str) -> Option<String> {
    let key = value.trim().to_lowercase();
    if key.is_empty() { None } else { Some(key) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_replaces_previous_pair() {
        let local = Uuid::new_v4();
        let mut ctx = MapContext::new();
        ctx.register(EntityKind::Category, local, RemoteId::new(1).unwrap());
        ctx.register(EntityKind::Category, local, RemoteId::new(2).unwrap());
        assert_eq!(ctx.local_id(EntityKind::Category, RemoteId::new(1).unwrap()), None);
        assert_eq!(ctx.remote_id(EntityKind::Category, local), RemoteId::new(2));
        ctx.forget(EntityKind::Category, local);
        assert_eq!(ctx.index_len(EntityKind::Category), 0);
    }

    #[test]
    fn test_fold_key() {
        assert_eq!(fold_key("  Shoes "), Some("shoes".to_string()));
        assert_eq!(fold_key("   "), None);
    }
}
