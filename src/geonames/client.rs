//! HTTP client for the GeoNames web services.

use crate::geonames::datasets::Dataset;
use crate::geonames::errors::FetchError;
use crate::utils::log_if_slow;
use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::trace;
use url::Url;

/// Requests slower than this are logged as warnings.
const SLOW_REQUEST_THRESHOLD: Duration = Duration::from_secs(3);

/// Authenticated GeoNames client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct GeoNamesClient {
    http: reqwest::Client,
    base_url: Url,
    username: String,
}

impl GeoNamesClient {
    /// Build a client with a per-request `timeout`.
    pub fn new(base_url: &str, username: impl Into<String>, timeout: Duration) -> Result<Self> {
        // Url::join replaces the last path segment unless the base ends in '/'.
        let mut base_url = Url::parse(base_url).context("Invalid GeoNames base URL")?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build reqwest client")?;

        Ok(Self {
            http,
            base_url,
            username: username.into(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetch and parse one country's records for dataset `D`.
    ///
    /// Returns [`FetchError::Cancelled`] as soon as `cancel` fires, dropping
    /// the in-flight request.
    pub async fn fetch<D: Dataset>(
        &self,
        country: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<D::Item>, FetchError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            body = self.fetch_body(D::ENDPOINT, country) => D::parse(&body?),
        }
    }

    async fn fetch_body(&self, endpoint: &str, country: &str) -> Result<String, FetchError> {
        let url = self
            .base_url
            .join(endpoint)
            .map_err(|e| FetchError::Parse(anyhow::Error::new(e).context("Invalid endpoint")))?;

        let start = Instant::now();
        let response = self
            .http
            .get(url)
            .query(&[("country", country), ("username", self.username.as_str())])
            .send()
            .await?;
        log_if_slow(start, SLOW_REQUEST_THRESHOLD, endpoint);

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.text().await?;
        trace!(endpoint, country, bytes = body.len(), "GeoNames response received");
        Ok(body)
    }
}
