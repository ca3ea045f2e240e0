//! Seam between the calendar pipeline and the upstream transport.

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use thiserror::Error;
use url::Url;

/// Headers and body of a successful origin response.
#[derive(Debug, Clone, Default)]
pub struct OriginResponse {
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("origin request failed: {message}")]
    Transport { message: String },
    #[error("origin responded with status {status}")]
    Status { status: StatusCode },
}

impl FetchError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Label used for the fetch outcome metric.
    pub fn outcome(&self) -> &'static str {
        match self {
            FetchError::Transport { .. } => "transport_error",
            FetchError::Status { .. } => "status_error",
        }
    }
}

#[async_trait]
pub trait OriginClient: Send + Sync {
    /// Fetch the calendar at `url`. Non-success statuses are reported as [`FetchError::Status`].
    async fn fetch(&self, url: &Url) -> Result<OriginResponse, FetchError>;
}
