//! Order Aggregate

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::customer::Address;
use crate::domain::value_objects::RemoteId;
use super::record::LocalRecord;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderData {
    pub number: Option<String>,
    pub status: OrderStatus,
    pub currency: String,
    pub customer_id: Option<Uuid>,
    pub billing: Address,
    pub shipping: Address,
    pub line_items: Vec<LineItem>,
    pub total: Decimal,
    pub customer_note: Option<String>,
    /// Remote customer with no local counterpart when last pulled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unresolved_customer: Option<RemoteId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: Option<Uuid>,
    pub name: String,
    pub sku: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total: Decimal,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Processing, OnHold, Completed, Cancelled, Refunded, Failed, CheckoutDraft }

impl OrderStatus {
    pub fn as_remote(&self) -> &'static str {
        match self {
            Self::Pending => "pending", Self::Processing => "processing", Self::OnHold => "on-hold",
            Self::Completed => "completed", Self::Cancelled => "cancelled", Self::Refunded => "refunded",
            Self::Failed => "failed", Self::CheckoutDraft => "checkout-draft",
        }
    }

    pub fn from_remote(value: &str) -> Self {
        match value {
            "processing" => Self::Processing, "on-hold" => Self::OnHold, "completed" => Self::Completed,
            "cancelled" => Self::Cancelled, "refunded" => Self::Refunded, "failed" => Self::Failed,
            "checkout-draft" => Self::CheckoutDraft, _ => Self::Pending,
        }
    }
}

impl OrderData {
    pub fn new(currency: &str) -> Self {
        Self {
            number: None, status: OrderStatus::Pending, currency: currency.to_uppercase(), customer_id: None,
            billing: Address::default(), shipping: Address::default(), line_items: vec![],
            total: Decimal::ZERO, customer_note: None, unresolved_customer: None,
        }
    }

    pub fn add_item(&mut self, item: LineItem) { self.line_items.push(item); self.recalculate(); }

    fn recalculate(&mut self) { self.total = self.line_items.iter().map(|i| i.total).sum(); }
}

impl LineItem {
    pub fn new(product_id: Option<Uuid>, name: impl Into<String>, quantity: u32, unit_price: Decimal) -> Self {
        Self { product_id, name: name.into(), sku: None, quantity, unit_price, total: unit_price * Decimal::from(quantity) }
    }
}

pub type Order = LocalRecord<OrderData>;
