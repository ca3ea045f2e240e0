//! `reqwest`-backed origin client.

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::{
    application::origin::{FetchError, OriginClient, OriginResponse},
    config::UpstreamSettings,
};

use super::error::InfraError;

pub struct HttpOrigin {
    client: Client,
}

impl HttpOrigin {
    pub fn new(settings: &UpstreamSettings) -> Result<Self, InfraError> {
        let mut builder = Client::builder().user_agent(settings.user_agent.as_str());
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl OriginClient for HttpOrigin {
    async fn fetch(&self, url: &Url) -> Result<OriginResponse, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| FetchError::transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status });
        }

        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|err| FetchError::transport(err.to_string()))?;

        Ok(OriginResponse { headers, body })
    }
}
