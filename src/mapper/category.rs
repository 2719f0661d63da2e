use uuid::Uuid;

use super::{fold_key, MapContext, SyncEntity};
use crate::domain::aggregates::CategoryData;
use crate::domain::value_objects::{non_empty, RemoteId, Slug};
use crate::remote::models::{CategoryPayload, WcCategory, WcImage};
use crate::EntityKind;

/// Binding for product categories.
pub struct Categories;

impl SyncEntity for Categories {
    const KIND: EntityKind = EntityKind::Category;
    type Data = CategoryData;
    type Remote = WcCategory;
    type Payload = CategoryPayload;

    fn to_remote(data: &CategoryData, ctx: &MapContext) -> CategoryPayload {
        CategoryPayload {
            name: data.name.clone(),
            slug: Slug::or_from_name(Some(data.slug.as_str()), &data.name).to_string(),
            description: data.description.clone().unwrap_or_default(),
            parent: data
                .parent_id
                .and_then(|p| ctx.remote_id(EntityKind::Category, p))
                .or(data.unresolved_parent)
                .map_or(0, |id| id.value()),
            image: data.image_url.clone().map(|src| WcImage { src }),
        }
    }

    fn to_local(remote: &WcCategory, ctx: &MapContext) -> CategoryData {
        let parent = RemoteId::new(remote.parent);
        let parent_id = parent.and_then(|p| ctx.local_id(EntityKind::Category, p));
        CategoryData {
            name: remote.name.clone(),
            slug: Slug::or_from_name(Some(&remote.slug), &remote.name),
            description: non_empty(&remote.description),
            parent_id,
            image_url: remote.image.as_ref().and_then(|i| non_empty(&i.src)),
            unresolved_parent: parent.filter(|_| parent_id.is_none()),
        }
    }

    fn label(data: &CategoryData) -> String { data.name.clone() }

    fn natural_key(data: &CategoryData) -> Option<String> { fold_key(&data.name) }

    fn remote_natural_key(remote: &WcCategory) -> Option<String> { fold_key(&remote.name) }

    fn parent(data: &CategoryData) -> Option<Uuid> { data.parent_id }
}
