//! Sub-asset extraction.

use async_trait::async_trait;

use super::{AssetError, AssetExtractor};
use crate::domain::{Bundle, ChapterAsset};

/// Treats the whole bundle as its single named asset.
///
/// The payload format is opaque to this crate, so the reference extractor
/// does not look inside it. Applications with a real container format plug
/// in their own [`AssetExtractor`].
#[derive(Debug, Clone, Default)]
pub struct WholeBundleExtractor;

#[async_trait]
impl AssetExtractor for WholeBundleExtractor {
    async fn extract(&self, bundle: &Bundle, asset_name: &str) -> Result<ChapterAsset, AssetError> {
        if bundle.is_empty() {
            return Err(AssetError::EmptyBundle(bundle.name().to_string()));
        }

        Ok(ChapterAsset {
            name: asset_name.to_string(),
            data: bundle.shared_data(),
        })
    }
}
