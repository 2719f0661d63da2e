//! WooCommerce REST shapes (v3).
//!
//! Inbound types tolerate missing fields; outbound payloads carry only the
//! fields the platform accepts on create/update.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::domain::value_objects::RemoteId;

/// A record as fetched from the remote platform.
pub trait RemoteRecord: DeserializeOwned + Clone + Send + Sync + 'static {
    fn remote_id(&self) -> Option<RemoteId>;
    /// Last modification time; `None` when the platform does not track it.
    fn modified_at(&self) -> Option<DateTime<Utc>>;
    fn label(&self) -> String;
}

// -----------------------------------------------------------------------------
// Inbound
// -----------------------------------------------------------------------------

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WcCategory {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub parent: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default)]
    pub image: Option<WcImage>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WcImage {
    pub src: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WcRef {
    pub id: i64,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WcProduct {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sku: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub short_description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub regular_price: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sale_price: String,
    #[serde(default)]
    pub manage_stock: bool,
    #[serde(default)]
    pub stock_quantity: Option<i64>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub categories: Vec<WcRef>,
    #[serde(default)]
    pub images: Vec<WcImage>,
    #[serde(default, deserialize_with = "gmt_datetime")]
    pub date_modified_gmt: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WcAddress {
    #[serde(default, deserialize_with = "null_as_default")]
    pub first_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub company: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub address_1: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub address_2: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub city: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub postcode: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WcCustomer {
    pub id: i64,
    pub email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub first_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub username: String,
    #[serde(default)]
    pub billing: WcAddress,
    #[serde(default)]
    pub shipping: WcAddress,
    #[serde(default, deserialize_with = "gmt_datetime")]
    pub date_modified_gmt: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WcLineItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub product_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sku: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default, deserialize_with = "flexible_decimal")]
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "flexible_decimal")]
    pub total: Option<Decimal>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WcOrder {
    pub id: i64,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub customer_id: i64,
    #[serde(default)]
    pub billing: WcAddress,
    #[serde(default)]
    pub shipping: WcAddress,
    #[serde(default)]
    pub line_items: Vec<WcLineItem>,
    #[serde(default, deserialize_with = "flexible_decimal")]
    pub total: Option<Decimal>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub customer_note: String,
    #[serde(default, deserialize_with = "gmt_datetime")]
    pub date_modified_gmt: Option<DateTime<Utc>>,
}

impl RemoteRecord for WcCategory {
    fn remote_id(&self) -> Option<RemoteId> { RemoteId::new(self.id) }
    fn modified_at(&self) -> Option<DateTime<Utc>> { None }
    fn label(&self) -> String { format!("category {} ({})", self.id, self.name) }
}

impl RemoteRecord for WcProduct {
    fn remote_id(&self) -> Option<RemoteId> { RemoteId::new(self.id) }
    fn modified_at(&self) -> Option<DateTime<Utc>> { self.date_modified_gmt }
    fn label(&self) -> String { format!("product {} ({})", self.id, self.name) }
}

impl RemoteRecord for WcCustomer {
    fn remote_id(&self) -> Option<RemoteId> { RemoteId::new(self.id) }
    fn modified_at(&self) -> Option<DateTime<Utc>> { self.date_modified_gmt }
    fn label(&self) -> String { format!("customer {} ({})", self.id, self.email) }
}

impl RemoteRecord for WcOrder {
    fn remote_id(&self) -> Option<RemoteId> { RemoteId::new(self.id) }
    fn modified_at(&self) -> Option<DateTime<Utc>> { self.date_modified_gmt }
    fn label(&self) -> String { format!("order {} (#{})", self.id, self.number) }
}

// -----------------------------------------------------------------------------
// Outbound
// -----------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CategoryPayload {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub parent: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<WcImage>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductPayload {
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub description: String,
    pub short_description: String,
    pub regular_price: String,
    pub sale_price: String,
    pub manage_stock: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<i64>,
    pub status: String,
    pub categories: Vec<WcRef>,
    pub images: Vec<WcImage>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CustomerPayload {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub billing: WcAddress,
    pub shipping: WcAddress,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LineItemPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<i64>,
    pub name: String,
    pub quantity: u32,
    pub total: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderPayload {
    pub status: String,
    pub currency: String,
    pub customer_id: i64,
    pub billing: WcAddress,
    pub shipping: WcAddress,
    pub customer_note: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_items: Option<Vec<LineItemPayload>>,
}

// -----------------------------------------------------------------------------
// Field helpers
// -----------------------------------------------------------------------------

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `date_modified_gmt` comes without an offset ("2024-03-01T10:00:00").
fn gmt_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    parse_gmt(raw).map(Some).map_err(serde::de::Error::custom)
}

pub fn parse_gmt(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| format!("invalid GMT timestamp {raw:?}: {e}"))
}

/// Amounts arrive as strings on some fields and numbers on others.
fn flexible_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Decimal::from_str(s.trim()).map(|d| Some(d.normalize())).map_err(serde::de::Error::custom),
        Some(Value::Number(n)) => Decimal::from_str(&n.to_string()).map(|d| Some(d.normalize())).map_err(serde::de::Error::custom),
        Some(other) => Err(serde::de::Error::custom(format!("expected amount, got {other}"))),
    }
}
