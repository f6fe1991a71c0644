//! Interfaces for external collaborators.
//!
//! A chapter never talks to the network, the disk or a store backend
//! directly. Each of those concerns is a trait here, injected through
//! [`Services`], with one reference implementation per trait in the
//! submodules.

pub mod disk_cache;
pub mod error;
pub mod extract;
pub mod http;
pub mod local;
pub mod localizer;
pub mod notifier;
pub mod oracle;
pub mod persistence;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::domain::{Bundle, ChapterAsset, VersionHash};

pub use disk_cache::DiskCacheStore;
pub use error::{AssetError, CacheError, FetchError, NotifyError, OracleError, StoreError};
pub use extract::WholeBundleExtractor;
pub use http::HttpManifestSource;
pub use local::FsLocalBundles;
pub use localizer::MapLocalizer;
pub use notifier::{JournalNotifier, NotificationContent};
pub use oracle::{CatalogOracle, PriceMetadata};
pub use persistence::{JsonFileStore, MemoryStore};

/// Retrieves manifest documents
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Fetch the raw manifest body at `url`
    async fn fetch_manifest(&self, url: &str) -> Result<String, FetchError>;
}

/// Content-addressed payload cache keyed by (URL, version)
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Whether the cache can serve requests yet
    fn is_ready(&self) -> bool;

    /// Serve version `version` of `url` from the cache, or download it and
    /// populate the cache. Transfer progress in `[0, 1]` is published on
    /// `progress`.
    async fn fetch_or_cache_hit(
        &self,
        url: &str,
        version: &VersionHash,
        progress: &watch::Sender<f32>,
    ) -> Result<Bundle, CacheError>;

    /// Evict every cached version of a bundle. Returns false when the
    /// eviction did not complete.
    async fn clear_versions(&self, bundle_id: &str) -> bool;

    async fn is_version_cached(&self, url: &str, version: &VersionHash) -> bool;
}

/// Turns a retrieved bundle into the named sub-asset
#[async_trait]
pub trait AssetExtractor: Send + Sync {
    async fn extract(&self, bundle: &Bundle, asset_name: &str) -> Result<ChapterAsset, AssetError>;
}

/// Payloads shipped with the application
#[async_trait]
pub trait LocalBundles: Send + Sync {
    /// Resolve a configured relative bundle path to a local path
    fn resolve(&self, relative: &str) -> PathBuf;

    async fn open(&self, path: &Path) -> Result<Bundle, CacheError>;
}

/// Purchase/store backend
#[async_trait]
pub trait PurchaseOracle: Send + Sync {
    fn is_initialized(&self) -> bool;

    async fn is_owned(&self, product_id: &str) -> bool;

    async fn localized_price(&self, product_id: &str) -> Result<PriceMetadata, OracleError>;
}

/// Local notification scheduler
#[async_trait]
pub trait Notifier: Send + Sync {
    fn is_initialized(&self) -> bool;

    /// Schedule a notification, returning its id
    async fn schedule(
        &self,
        deliver_at: DateTime<Utc>,
        content: NotificationContent,
    ) -> Result<String, NotifyError>;

    async fn cancel(&self, notification_id: &str) -> Result<(), NotifyError>;
}

/// Durable key-value storage surviving restarts
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: String);

    /// Make every `set` so far durable
    fn flush(&self) -> Result<(), StoreError>;
}

/// Localized string lookup
pub trait Localizer: Send + Sync {
    fn translate(&self, key: &str) -> String;
}

/// The collaborators a chapter is constructed with
#[derive(Clone)]
pub struct Services {
    pub manifests: Arc<dyn ManifestSource>,
    pub cache: Arc<dyn CacheStore>,
    pub extractor: Arc<dyn AssetExtractor>,
    pub local: Arc<dyn LocalBundles>,
    pub oracle: Arc<dyn PurchaseOracle>,
    pub notifier: Arc<dyn Notifier>,
    pub store: Arc<dyn KeyValueStore>,
    pub localizer: Arc<dyn Localizer>,
}
