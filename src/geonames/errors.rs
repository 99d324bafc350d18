//! Error types for the GeoNames client.

use reqwest::StatusCode;

/// Why a single country's fetch produced no update.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("upstream returned status {0}")]
    Status(StatusCode),
    /// GeoNames reports credential and quota problems in the body with a 200 status.
    #[error("upstream error {code}: {message}")]
    Upstream { code: i64, message: String },
    #[error("failed to parse response")]
    Parse(#[source] anyhow::Error),
    #[error("no records returned")]
    Empty,
    #[error("cancelled")]
    Cancelled,
}

impl FetchError {
    /// Empty responses are an expected "nothing to update", not a failure.
    pub fn is_empty(&self) -> bool {
        matches!(self, FetchError::Empty)
    }
}
