//! Remote platform access: HTTP client, throttling, platform adapters and
//! the WooCommerce wire shapes.

pub mod adapter;
pub mod client;
pub mod error;
pub mod models;
pub mod throttle;
pub mod woocommerce;

pub use adapter::{AdapterFactory, PlatformAdapters, RemotePage, RemotePlatformAdapter};
pub use client::{ClientOptions, Credentials, RemoteClient, RemoteResponse};
pub use error::RemoteError;
pub use models::RemoteRecord;
pub use throttle::RequestThrottle;
pub use woocommerce::WooCommerceAdapter;
