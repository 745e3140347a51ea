use crate::config::UpstreamConfig;
use crate::error::{CarbideError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;

/// Plain byte download of a remote URL (release assets, image lists, chart
/// indexes and archives).
#[async_trait]
pub trait RawFetcher: Send + Sync {
    /// Fetch `url`. Any status other than 200 is an [`CarbideError::UpstreamFetch`].
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}

/// Build the shared reqwest client from upstream settings
pub fn build_client(upstream: &UpstreamConfig) -> Result<Client> {
    let mut builder = Client::builder()
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(std::time::Duration::from_secs(90));

    if let Some(timeout_secs) = upstream.timeout_secs {
        builder = builder.timeout(std::time::Duration::from_secs(timeout_secs));
    }
    if let Some(user_agent) = &upstream.user_agent {
        builder = builder.user_agent(user_agent.clone());
    }

    builder.build().map_err(CarbideError::Http)
}

/// HTTP client for raw upstream downloads
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(upstream: &UpstreamConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(upstream)?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RawFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        tracing::debug!(url = %url, "Downloading upstream file");

        let response = self.client.get(url).send().await.map_err(|e| {
            tracing::warn!(url = %url, error = %e, "Upstream unreachable");
            CarbideError::UpstreamFetch {
                url: url.to_string(),
                status: 0,
            }
        })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            tracing::warn!(url = %url, status = %status, "Upstream returned error status");
            return Err(CarbideError::UpstreamFetch {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.bytes().await.map_err(|e| {
            tracing::warn!(url = %url, error = %e, "Failed to read upstream response");
            CarbideError::UpstreamFetch {
                url: url.to_string(),
                status: status.as_u16(),
            }
        })
    }
}
