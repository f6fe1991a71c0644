//! Error types for collaborator adapters.

use std::time::Duration;

use thiserror::Error;

use crate::domain::VersionParseError;

/// Manifest or payload transfer failure
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error {status} for {url}")]
    Http { url: String, status: u16 },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed manifest: {0}")]
    MalformedManifest(#[from] VersionParseError),
}

/// Version cache failure
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Transfer failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cached payload for {url} is corrupt (expected {expected}, got {actual})")]
    Integrity {
        url: String,
        expected: String,
        actual: String,
    },
}

/// Sub-asset materialization failure
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Asset '{asset}' not found in bundle '{bundle}'")]
    NotFound { asset: String, bundle: String },

    #[error("Bundle '{0}' is empty")]
    EmptyBundle(String),
}

/// Store backend failure
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("There is no product for {0}")]
    UnknownProduct(String),

    #[error("There is no localized data for {0}")]
    NoMetadata(String),
}

/// Notifier backend failure
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key-value store failure
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
