//! Aggregates module
pub mod record;
pub mod store;
pub mod category;
pub mod product;
pub mod customer;
pub mod order;

pub use record::LocalRecord;
pub use store::{Organization, Store, StoreSyncState, StoreSyncStatus, SyncStatusMap};
pub use category::{Category, CategoryData};
pub use product::{Product, ProductData, ProductStatus};
pub use customer::{Address, Customer, CustomerData};
pub use order::{LineItem, Order, OrderData, OrderStatus};
