//! Payload handles.
//!
//! The payload format is opaque. A [`Bundle`] is what the cache or the
//! bundled storage returns; a [`ChapterAsset`] is the named sub-asset the
//! chapter actually holds on to. Dropping a handle releases it.

use std::path::Path;
use std::sync::Arc;

use super::VersionHash;

/// Where a bundle's bytes came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleOrigin {
    /// Served from the version cache
    Cache,

    /// Transferred over the network (and now cached)
    Network,

    /// Read from bundled application storage
    Local,
}

/// Retrieved payload bytes
#[derive(Debug, Clone)]
pub struct Bundle {
    name: String,
    version: VersionHash,
    origin: BundleOrigin,
    data: Arc<[u8]>,
}

impl Bundle {
    pub fn new(
        name: impl Into<String>,
        version: VersionHash,
        origin: BundleOrigin,
        data: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            name: name.into(),
            version,
            origin,
            data: data.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> VersionHash {
        self.version
    }

    pub fn origin(&self) -> BundleOrigin {
        self.origin
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Shared handle to the bytes, used by extractors that keep the data
    pub fn shared_data(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Sub-asset extracted from a bundle
#[derive(Debug, Clone)]
pub struct ChapterAsset {
    pub name: String,
    pub data: Arc<[u8]>,
}

/// The active payload of a loaded chapter
#[derive(Debug)]
pub struct LoadedPayload {
    pub bundle: Bundle,
    pub asset: ChapterAsset,
}

/// Cache eviction key for a payload URL: its base filename without
/// extension, ignoring any query or fragment.
pub fn bundle_id(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file_name = path.rsplit('/').next().unwrap_or(path);

    Path::new(file_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
