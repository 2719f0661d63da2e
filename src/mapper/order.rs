use rust_decimal::Decimal;

use super::customer::{address_to_local, address_to_remote};
use super::{MapContext, SyncEntity};
use crate::domain::aggregates::{LineItem, OrderData, OrderStatus};
use crate::domain::value_objects::{format_amount, non_empty, RemoteId};
use crate::remote::models::{LineItemPayload, OrderPayload, WcOrder};
use crate::EntityKind;

pub struct Orders;

impl SyncEntity for Orders {
    const KIND: EntityKind = EntityKind::Order;
    type Data = OrderData;
    type Remote = WcOrder;
    type Payload = OrderPayload;

    fn to_remote(data: &OrderData, ctx: &MapContext) -> OrderPayload {
        let line_items = data
            .line_items
            .iter()
            .map(|item| LineItemPayload {
                product_id: item
                    .product_id
                    .and_then(|p| ctx.remote_id(EntityKind::Product, p))
                    .map(|id| id.value()),
                name: item.name.clone(),
                quantity: item.quantity,
                total: format_amount(Some(item.total)),
            })
            .collect();
        OrderPayload { line_items: Some(line_items), ..Self::to_remote_update(data, ctx) }
    }

    /// Line items sent on update are appended remotely, so updates leave them out.
    fn to_remote_update(data: &OrderData, ctx: &MapContext) -> OrderPayload {
        OrderPayload {
            status: data.status.as_remote().to_string(),
            currency: data.currency.clone(),
            customer_id: data
                .customer_id
                .and_then(|c| ctx.remote_id(EntityKind::Customer, c))
                .or(data.unresolved_customer)
                .map_or(0, |id| id.value()),
            billing: address_to_remote(&data.billing),
            shipping: address_to_remote(&data.shipping),
            customer_note: data.customer_note.clone().unwrap_or_default(),
            line_items: None,
        }
    }

    fn to_local(remote: &WcOrder, ctx: &MapContext) -> OrderData {
        let customer = RemoteId::new(remote.customer_id);
        let customer_id = customer.and_then(|c| ctx.local_id(EntityKind::Customer, c));
        OrderData {
            number: non_empty(&remote.number),
            status: OrderStatus::from_remote(&remote.status),
            currency: remote.currency.trim().to_uppercase(),
            customer_id,
            billing: address_to_local(&remote.billing),
            shipping: address_to_local(&remote.shipping),
            line_items: remote
                .line_items
                .iter()
                .map(|item| LineItem {
                    product_id: RemoteId::new(item.product_id).and_then(|p| ctx.local_id(EntityKind::Product, p)),
                    name: item.name.clone(),
                    sku: non_empty(&item.sku),
                    quantity: u32::try_from(item.quantity).unwrap_or(0),
                    unit_price: item.price.unwrap_or(Decimal::ZERO),
                    total: item.total.unwrap_or(Decimal::ZERO),
                })
                .collect(),
            total: remote.total.unwrap_or(Decimal::ZERO),
            customer_note: non_empty(&remote.customer_note),
            unresolved_customer: customer.filter(|_| customer_id.is_none()),
        }
    }

    fn label(data: &OrderData) -> String {
        match &data.number {
            Some(n) => format!("order #{n}"),
            None => format!("order ({} items)", data.line_items.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::models::WcLineItem;
    use uuid::Uuid;

    #[test]
    fn test_create_payload_carries_line_items_update_does_not() {
        let product = Uuid::new_v4();
        let ctx = MapContext::new().with_index(EntityKind::Product, [(product, RemoteId::new(77).unwrap())]);
        let mut data = OrderData::new("EUR");
        data.add_item(LineItem::new(Some(product), "Lamp", 2, Decimal::new(1000, 2)));

        let create = Orders::to_remote(&data, &ctx);
        let items = create.line_items.unwrap();
        assert_eq!(items[0].product_id, Some(77));
        assert_eq!(items[0].total, "20");
        assert!(Orders::to_remote_update(&data, &ctx).line_items.is_none());
    }

    #[test]
    fn test_guest_order_has_no_customer() {
        let remote = WcOrder {
            id: 5,
            number: "1005".into(),
            status: "on-hold".into(),
            currency: "usd".into(),
            customer_id: 0,
            line_items: vec![WcLineItem { name: "Lamp".into(), product_id: 12, quantity: 1, ..Default::default() }],
            ..Default::default()
        };
        let local = Orders::to_local(&remote, &MapContext::new());
        assert!(local.customer_id.is_none());
        assert!(local.unresolved_customer.is_none());
        assert_eq!(Orders::to_remote_update(&local, &MapContext::new()).customer_id, 0);
        assert_eq!(local.status, OrderStatus::OnHold);
        assert_eq!(local.currency, "USD");
        assert!(local.line_items[0].product_id.is_none());
        assert_eq!(Orders::label(&local), "order #1005");
    }

    #[test]
    fn test_update_keeps_customer_not_synced_locally() {
        let remote = WcOrder { id: 50, status: "processing".into(), currency: "NGN".into(), customer_id: 30, ..Default::default() };
        let mut local = Orders::to_local(&remote, &MapContext::new());
        assert!(local.customer_id.is_none());
        assert_eq!(local.unresolved_customer, RemoteId::new(30));

        local.status = OrderStatus::Completed;
        let update = Orders::to_remote_update(&local, &MapContext::new());
        assert_eq!(update.customer_id, 30);
        assert_eq!(update.status, "completed");
    }
}
