use super::{MapContext, SyncEntity};
use crate::domain::aggregates::{ProductData, ProductStatus};
use crate::domain::value_objects::{format_amount, non_empty, parse_amount, RemoteId, Slug};
use crate::remote::models::{ProductPayload, WcImage, WcProduct, WcRef};
use crate::EntityKind;

pub struct Products;

impl SyncEntity for Products {
    const KIND: EntityKind = EntityKind::Product;
    type Data = ProductData;
    type Remote = WcProduct;
    type Payload = ProductPayload;

    fn to_remote(data: &ProductData, ctx: &MapContext) -> ProductPayload {
        ProductPayload {
            name: data.name.clone(),
            slug: data.slug.to_string(),
            sku: data.sku.clone().unwrap_or_default(),
            description: data.description.clone().unwrap_or_default(),
            short_description: data.short_description.clone().unwrap_or_default(),
            regular_price: format_amount(data.regular_price),
            sale_price: format_amount(data.sale_price),
            manage_stock: data.manage_stock,
            stock_quantity: if data.manage_stock { data.stock_quantity } else { None },
            status: data.status.as_str().to_string(),
            categories: remote_categories(data, ctx),
            images: data.images.iter().map(|src| WcImage { src: src.clone() }).collect(),
        }
    }

    fn to_local(remote: &WcProduct, ctx: &MapContext) -> ProductData {
        let mut category_ids = Vec::new();
        let mut unresolved_category_ids = Vec::new();
        for id in remote.categories.iter().filter_map(|c| RemoteId::new(c.id)) {
            match ctx.local_id(EntityKind::Category, id) {
                Some(local) => category_ids.push(local),
                None => unresolved_category_ids.push(id),
            }
        }
        ProductData {
            name: remote.name.clone(),
            slug: Slug::or_from_name(Some(&remote.slug), &remote.name),
            sku: non_empty(&remote.sku),
            description: non_empty(&remote.description),
            short_description: non_empty(&remote.short_description),
            regular_price: parse_amount(&remote.regular_price),
            sale_price: parse_amount(&remote.sale_price),
            manage_stock: remote.manage_stock,
            stock_quantity: if remote.manage_stock { remote.stock_quantity } else { None },
            status: ProductStatus::from_remote(&remote.status),
            category_ids,
            images: remote.images.iter().filter_map(|i| non_empty(&i.src)).collect(),
            unresolved_category_ids,
        }
    }

    fn label(data: &ProductData) -> String {
        match &data.sku {
            Some(sku) => format!("{} [{}]", data.name, sku),
            None => data.name.clone(),
        }
    }
}

/// Local categories that have a remote id, followed by remote categories never seen locally.
fn remote_categories(data: &ProductData, ctx: &MapContext) -> Vec<WcRef> {
    let mut ids: Vec<RemoteId> = data
        .category_ids
        .iter()
        .filter_map(|id| ctx.remote_id(EntityKind::Category, *id))
        .collect();
    for id in &data.unresolved_category_ids {
        if !ids.contains(id) {
            ids.push(*id);
        }
    }
    ids.into_iter().map(|id| WcRef { id: id.value() }).collect()
}
