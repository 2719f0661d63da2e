//! Category Aggregate

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::record::LocalRecord;
use crate::domain::value_objects::{RemoteId, Slug};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryData {
    pub name: String,
    pub slug: Slug,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub image_url: Option<String>,
    /// Remote parent that had no local counterpart when last pulled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unresolved_parent: Option<RemoteId>,
}

impl CategoryData {
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self { slug: Slug::from_name(&name), name, description: None, parent_id: None, image_url: None, unresolved_parent: None }
    }

    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self.unresolved_parent = None;
        self
    }
}

pub type Category = LocalRecord<CategoryData>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_derives_slug() {
        let c = CategoryData::named("Garden Tools");
        assert_eq!(c.slug.as_str(), "garden-tools");
        assert!(c.parent_id.is_none());
    }

    #[test]
    fn test_payload_without_unresolved_parent_decodes() {
        let stored = r#"{"name":"Toys","slug":"toys","description":null,"parent_id":null,"image_url":null}"#;
        let c: CategoryData = serde_json::from_str(stored).unwrap();
        assert_eq!(c, CategoryData::named("Toys"));
    }
}
