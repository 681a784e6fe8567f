use async_trait::async_trait;
use parley_core::{ProviderError, ReleaseInfo, ReleaseSource};
use reqwest::Client;
use tracing::info;

/// Reads the latest release from a GitHub-style `releases/latest` endpoint.
#[derive(Debug, Clone)]
pub struct GithubReleases {
    client: Client,
    endpoint: String,
}

impl GithubReleases {
    #[must_use]
    pub fn new(endpoint: String) -> Self {
        Self {
            client: Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl ReleaseSource for GithubReleases {
    async fn latest_release(&self) -> Result<ReleaseInfo, ProviderError> {
        info!("Checking latest release at {}", self.endpoint);

        let response = self
            .client
            .get(&self.endpoint)
            .header(
                reqwest::header::USER_AGENT,
                concat!("parley/", env!("CARGO_PKG_VERSION")),
            )
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json::<ReleaseInfo>()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}
