//! Bundled (preloaded) payloads read from the application's asset directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::{CacheError, LocalBundles};
use crate::domain::{bundle_id, Bundle, BundleOrigin, VersionHash};

/// Reads bundled payloads relative to a root directory
pub struct FsLocalBundles {
    root: PathBuf,
}

impl FsLocalBundles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl LocalBundles for FsLocalBundles {
    fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    async fn open(&self, path: &Path) -> Result<Bundle, CacheError> {
        let data = fs::read(path).await?;
        let name = bundle_id(&path.to_string_lossy());
        Ok(Bundle::new(name, VersionHash::ZERO, BundleOrigin::Local, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_bundled_payload() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("chapters")).unwrap();
        std::fs::write(temp.path().join("chapters/chapter_1.bundle"), b"bundled").unwrap();

        let local = FsLocalBundles::new(temp.path());
        let path = local.resolve("chapters/chapter_1.bundle");
        let bundle = local.open(&path).await.unwrap();

        assert_eq!(bundle.name(), "chapter_1");
        assert_eq!(bundle.origin(), BundleOrigin::Local);
        assert_eq!(bundle.data(), b"bundled");
    }

    #[tokio::test]
    async fn test_missing_payload_is_io_error() {
        let temp = TempDir::new().unwrap();
        let local = FsLocalBundles::new(temp.path());
        let err = local.open(&local.resolve("missing.bundle")).await.unwrap_err();
        assert!(matches!(err, CacheError::Io(_)));
    }
}
