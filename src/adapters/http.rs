//! HTTP manifest retrieval.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{FetchError, ManifestSource};

/// Fetches manifest documents over HTTP(S)
pub struct HttpManifestSource {
    client: Client,
}

impl HttpManifestSource {
    /// Create a manifest source whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("folio/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ManifestSource for HttpManifestSource {
    async fn fetch_manifest(&self, url: &str) -> Result<String, FetchError> {
        debug!(%url, "Requesting manifest");
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let source = HttpManifestSource::new(Duration::from_millis(500)).unwrap();
        let err = source
            .fetch_manifest("http://127.0.0.1:9/chapter.manifest")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
    }
}
