//! OpenSASE Store Sync
//!
//! Keeps the commerce back-office's local catalog, customers and orders in
//! step with each store's remote platform (WooCommerce).
//!
//! ## Features
//! - Paginated remote fetch with client-side throttling
//! - Timestamp-driven reconciliation (push, pull, import, orphan recovery)
//! - Sequential per-store orchestration with a persisted in-flight claim
//! - Background execution of sync phases
//! - Audit publishing over NATS

pub mod api;
pub mod audit;
pub mod config;
pub mod domain;
pub mod mapper;
pub mod remote;
pub mod repo;
pub mod sync;
pub mod worker;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

pub use remote::RemoteError;

// =============================================================================
// Core Types
// =============================================================================

/// Entity types reconciled by the sync core, in canonical phase order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Category,
    Product,
    Customer,
    Order,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [Self::Category, Self::Product, Self::Customer, Self::Order];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Product => "product",
            Self::Customer => "customer",
            Self::Order => "order",
        }
    }

    /// Local table holding records of this kind.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Category => "categories",
            Self::Product => "products",
            Self::Customer => "customers",
            Self::Order => "orders",
        }
    }

    /// Kinds whose remote ids this kind's payload references.
    pub fn references(&self) -> &'static [EntityKind] {
        match self {
            Self::Category => &[Self::Category],
            Self::Product => &[Self::Category],
            Self::Customer => &[],
            Self::Order => &[Self::Customer, Self::Product],
        }
    }

    /// Requested kinds, deduplicated and in canonical order.
    pub fn canonical(requested: Option<&[EntityKind]>) -> Vec<EntityKind> {
        match requested {
            None => Self::ALL.to_vec(),
            Some(kinds) if kinds.is_empty() => Self::ALL.to_vec(),
            Some(kinds) => Self::ALL.into_iter().filter(|k| kinds.contains(k)).collect(),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Per-record sync state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSyncStatus {
    #[default]
    Pending,
    Synced,
    Failed,
}

impl RecordSyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "synced" => Some(Self::Synced),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Per-phase status kept in the store's status map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl PhaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Remote platform a store connects to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    #[default]
    #[serde(rename = "woocommerce")]
    WooCommerce,
    Shopify,
    Magento,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WooCommerce => "woocommerce",
            Self::Shopify => "shopify",
            Self::Magento => "magento",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "woocommerce" => Some(Self::WooCommerce),
            "shopify" => Some(Self::Shopify),
            "magento" => Some(Self::Magento),
            _ => None,
        }
    }

    pub fn is_supported(&self) -> bool { matches!(self, Self::WooCommerce) }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

// =============================================================================
// Error Types
// =============================================================================

/// Coarse classification used in outcomes and audit entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transport,
    Auth,
    RateLimit,
    Validation,
    NotFound,
    Decode,
    Storage,
    Unsupported,
    Conflict,
    Infrastructure,
}

impl ErrorKind {
    /// Operator-facing hint attached to audit entries.
    pub fn remediation(&self) -> &'static str {
        match self {
            Self::Transport => "Check that the store URL is reachable; the next sync will retry.",
            Self::Auth => "Regenerate the store's API key and secret with read/write access.",
            Self::RateLimit => "The remote platform is throttling requests; raise SYNC_REQUEST_INTERVAL_MS or sync less often.",
            Self::Validation => "Fix the record so the remote platform accepts it, then sync again.",
            Self::NotFound => "The store or organization no longer exists; remove stale triggers.",
            Self::Decode => "The remote platform returned an unexpected payload; check its API version.",
            Self::Storage => "Check database connectivity and migrations.",
            Self::Unsupported => "Only WooCommerce stores can be synchronized.",
            Self::Conflict => "A sync for this store is already running; wait for it to finish.",
            Self::Infrastructure => "The sync worker stopped unexpectedly; check service logs.",
        }
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Store not found: {0}")]
    StoreNotFound(Uuid),

    #[error("Organization not found: {0}")]
    OrganizationNotFound(Uuid),

    #[error("Organization is inactive: {0}")]
    OrganizationInactive(Uuid),

    #[error("Store is inactive: {0}")]
    StoreInactive(Uuid),

    #[error("Store {0} has no API credentials")]
    MissingCredentials(Uuid),

    #[error("Platform not supported: {0}")]
    UnsupportedPlatform(Platform),

    #[error("Sync already running for store {0}")]
    SyncInProgress(Uuid),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Worker failure: {0}")]
    Infrastructure(String),
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::StoreNotFound(_) | Self::OrganizationNotFound(_) => ErrorKind::NotFound,
            Self::OrganizationInactive(_) | Self::StoreInactive(_) | Self::MissingCredentials(_) => ErrorKind::Validation,
            Self::UnsupportedPlatform(_) => ErrorKind::Unsupported,
            Self::SyncInProgress(_) => ErrorKind::Conflict,
            Self::Remote(e) => e.kind(),
            Self::Storage(_) => ErrorKind::Storage,
            Self::Decode(_) => ErrorKind::Decode,
            Self::Infrastructure(_) => ErrorKind::Infrastructure,
        }
    }

    pub fn remediation(&self) -> &'static str {
        match self {
            Self::OrganizationInactive(_) | Self::StoreInactive(_) => "Reactivate the store and its organization before syncing.",
            Self::MissingCredentials(_) => "Set the store URL, API key and API secret.",
            other => other.kind().remediation(),
        }
    }

    /// Errors that make every further call in the phase pointless.
    pub fn is_phase_fatal(&self) -> bool {
        matches!(self, Self::Remote(e) if e.is_phase_fatal())
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(e: sqlx::Error) -> Self { Self::Storage(e.to_string()) }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self { Self::Decode(e.to_string()) }
}

pub type Result<T> = std::result::Result<T, SyncError>;
