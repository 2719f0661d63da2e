//! Product Aggregate

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::record::LocalRecord;
use crate::domain::value_objects::{RemoteId, Slug};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductData {
    pub name: String,
    pub slug: Slug,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub regular_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub manage_stock: bool,
    pub stock_quantity: Option<i64>,
    pub status: ProductStatus,
    pub category_ids: Vec<Uuid>,
    pub images: Vec<String>,
    /// Remote categories with no local counterpart when last pulled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved_category_ids: Vec<RemoteId>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus { #[default] Draft, Pending, Private, Publish }

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Draft => "draft", Self::Pending => "pending", Self::Private => "private", Self::Publish => "publish" }
    }

    /// Unknown remote statuses are kept as drafts.
    pub fn from_remote(value: &str) -> Self {
        match value { "publish" => Self::Publish, "pending" => Self::Pending, "private" => Self::Private, _ => Self::Draft }
    }
}

impl ProductData {
    pub fn new(name: impl Into<String>, regular_price: Option<Decimal>) -> Self {
        let name = name.into();
        Self {
            slug: Slug::from_name(&name), name, sku: None, description: None, short_description: None,
            regular_price, sale_price: None, manage_stock: false, stock_quantity: None,
            status: ProductStatus::Draft, category_ids: vec![], images: vec![], unresolved_category_ids: vec![],
        }
    }
}

pub type Product = LocalRecord<ProductData>;
