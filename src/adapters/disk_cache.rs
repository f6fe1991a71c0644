//! Disk-backed, content-addressed payload cache.
//!
//! Layout under the cache root:
//!
//! ```text
//! <bundle_id>/<version>/payload.bin
//! <bundle_id>/<version>/payload.sha256
//! ```
//!
//! Several versions of one bundle may coexist; eviction always removes the
//! whole `<bundle_id>` directory. Payloads are written atomically and their
//! SHA-256 digest is checked on every cache hit, so an interrupted or
//! corrupted entry is downloaded again instead of being served.
//!
//! Transfers have no overall deadline. A download only fails when the
//! connection cannot be established or no data arrives for the idle timeout.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{CacheError, CacheStore, FetchError};
use crate::domain::{bundle_id, Bundle, BundleOrigin, VersionHash};

const PAYLOAD_FILE: &str = "payload.bin";
const DIGEST_FILE: &str = "payload.sha256";

/// Version cache stored in a local directory
pub struct DiskCacheStore {
    root: PathBuf,
    client: Client,
    idle_timeout: Duration,
    ready: AtomicBool,
}

impl DiskCacheStore {
    /// Open (creating if needed) a cache rooted at `root`. `timeout`
    /// bounds connecting and each wait for response data.
    pub async fn open(root: impl Into<PathBuf>, timeout: Duration) -> Result<Self, CacheError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .user_agent(format!("folio/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FetchError::from)?;
        Self::with_client(root, client, timeout).await
    }

    /// Open a cache that downloads through `client`
    pub async fn with_client(
        root: impl Into<PathBuf>,
        client: Client,
        idle_timeout: Duration,
    ) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;

        Ok(Self {
            root,
            client,
            idle_timeout,
            ready: AtomicBool::new(true),
        })
    }

    /// Cache root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_dir(&self, url: &str, version: &VersionHash) -> PathBuf {
        self.root.join(bundle_id(url)).join(version.to_string())
    }

    /// Read a cached entry, returning None when it is missing or corrupt
    async fn read_entry(&self, url: &str, version: &VersionHash) -> Result<Option<Vec<u8>>, CacheError> {
        let dir = self.entry_dir(url, version);
        let payload_path = dir.join(PAYLOAD_FILE);
        let digest_path = dir.join(DIGEST_FILE);

        if !payload_path.exists() || !digest_path.exists() {
            return Ok(None);
        }

        let data = fs::read(&payload_path).await?;
        let expected = fs::read_to_string(&digest_path).await?;
        let actual = digest(&data);

        if expected.trim() != actual {
            let err = CacheError::Integrity {
                url: url.to_string(),
                expected: expected.trim().to_string(),
                actual,
            };
            warn!(error = %err, "Discarding corrupt cache entry");
            fs::remove_dir_all(&dir).await?;
            return Ok(None);
        }

        Ok(Some(data))
    }

    async fn write_entry(&self, url: &str, version: &VersionHash, data: &[u8]) -> Result<(), CacheError> {
        let dir = self.entry_dir(url, version);
        fs::create_dir_all(&dir).await?;

        atomic_write(&dir.join(PAYLOAD_FILE), data).await?;
        atomic_write(&dir.join(DIGEST_FILE), digest(data).as_bytes()).await?;
        Ok(())
    }

    async fn download(&self, url: &str, progress: &watch::Sender<f32>) -> Result<Vec<u8>, FetchError> {
        let idle = self.idle_timeout;
        let mut response = tokio::time::timeout(idle, self.client.get(url).send())
            .await
            .map_err(|_| FetchError::Timeout(idle))??;

        if !response.status().is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let total = response.content_length().filter(|len| *len > 0);
        let mut data = Vec::with_capacity(total.unwrap_or(0) as usize);

        while let Some(chunk) = tokio::time::timeout(idle, response.chunk())
            .await
            .map_err(|_| FetchError::Timeout(idle))??
        {
            data.extend_from_slice(&chunk);
            if let Some(total) = total {
                let fraction = (data.len() as f64 / total as f64).min(1.0) as f32;
                progress.send_replace(fraction);
            }
        }

        Ok(data)
    }
}

#[async_trait]
impl CacheStore for DiskCacheStore {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    async fn fetch_or_cache_hit(
        &self,
        url: &str,
        version: &VersionHash,
        progress: &watch::Sender<f32>,
    ) -> Result<Bundle, CacheError> {
        let name = bundle_id(url);

        if let Some(data) = self.read_entry(url, version).await? {
            debug!(bundle = %name, %version, "Serving payload from cache");
            progress.send_replace(1.0);
            return Ok(Bundle::new(name, *version, BundleOrigin::Cache, data));
        }

        info!(bundle = %name, %version, "Downloading payload");
        progress.send_replace(0.0);
        let data = self.download(url, progress).await?;
        self.write_entry(url, version, &data).await?;
        progress.send_replace(1.0);

        Ok(Bundle::new(name, *version, BundleOrigin::Network, data))
    }

    async fn clear_versions(&self, bundle_id: &str) -> bool {
        let dir = self.root.join(bundle_id);
        if !dir.exists() {
            return true;
        }

        match fs::remove_dir_all(&dir).await {
            Ok(()) => true,
            Err(e) => {
                warn!(bundle = %bundle_id, error = %e, "Failed to clear cached versions");
                false
            }
        }
    }

    async fn is_version_cached(&self, url: &str, version: &VersionHash) -> bool {
        let dir = self.entry_dir(url, version);
        dir.join(PAYLOAD_FILE).exists() && dir.join(DIGEST_FILE).exists()
    }
}

/// Hex SHA-256 of a payload
fn digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Write to a temp file private to this writer, then rename over the target
async fn atomic_write(path: &Path, data: &[u8]) -> Result<(), CacheError> {
    let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
    fs::write(&temp_path, data).await?;
    fs::rename(&temp_path, path).await?;
    Ok(())
}
