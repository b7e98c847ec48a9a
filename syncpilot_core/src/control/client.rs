//! HTTP implementation of the control API
//!
//! One shared reqwest client serves every instance; each instance is addressed
//! through its configured base URL.

use super::messages::{CommandResponse, EmptyRequest, Endpoint, ProgressResponse, StartRequest};
use super::{ControlApi, ControlResult};
use crate::error::{ControlError, Result, ValidationError};
use crate::progress::Progress;
use crate::registry::InstanceId;
use async_trait::async_trait;
use log::{debug, trace, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Upper bound for a whole request, connect included
    pub request_timeout: Duration,
    /// Upper bound for establishing the connection
    pub connect_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// reqwest-backed [`ControlApi`]
#[derive(Debug, Clone)]
pub struct HttpControlClient {
    http: reqwest::Client,
    base_urls: HashMap<InstanceId, String>,
}

impl HttpControlClient {
    /// Create a client for the given `(instance, base URL)` pairs
    pub fn new(
        instances: impl IntoIterator<Item = (InstanceId, String)>,
        config: &HttpClientConfig,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| {
                ValidationError::invalid_configuration(&format!("Failed to build HTTP client: {e}"))
            })?;

        let base_urls = instances
            .into_iter()
            .map(|(id, url)| (id, url.trim_end_matches('/').to_string()))
            .collect();

        debug!("Created control API client with config: {config:?}");
        Ok(Self { http, base_urls })
    }

    fn url(&self, id: &InstanceId, endpoint: Endpoint) -> ControlResult<String> {
        let base = self
            .base_urls
            .get(id)
            .ok_or_else(|| ControlError::not_configured(id.as_str()))?;
        Ok(format!("{base}{}", endpoint.path()))
    }

    fn map_error(id: &InstanceId, endpoint: Endpoint, error: reqwest::Error) -> ControlError {
        if error.is_timeout() {
            ControlError::timeout(id.as_str(), endpoint.name())
        } else if error.is_decode() {
            ControlError::decode(id.as_str(), endpoint.name(), error.to_string())
        } else {
            ControlError::transport(id.as_str(), endpoint.name(), error.to_string())
        }
    }

    async fn read_json<T: DeserializeOwned>(
        id: &InstanceId,
        endpoint: Endpoint,
        response: reqwest::Response,
    ) -> ControlResult<T> {
        let status = response.status();
        if !status.is_success() {
            warn!("{endpoint} on instance {id} returned HTTP {status}");
            return Err(ControlError::http_status(
                id.as_str(),
                endpoint.name(),
                status.as_u16(),
            ));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| Self::map_error(id, endpoint, e))
    }

    async fn command<B: Serialize + Sync>(
        &self,
        id: &InstanceId,
        endpoint: Endpoint,
        body: &B,
    ) -> ControlResult<()> {
        let url = self.url(id, endpoint)?;
        trace!("POST {url}");

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| Self::map_error(id, endpoint, e))?;

        let answer: CommandResponse = Self::read_json(id, endpoint, response).await?;
        if answer.success {
            debug!("Instance {id} accepted {endpoint}");
            Ok(())
        } else {
            warn!("Instance {id} refused {endpoint}");
            Err(ControlError::rejected(id.as_str(), endpoint.name()))
        }
    }
}

#[async_trait]
impl ControlApi for HttpControlClient {
    async fn start(&self, id: &InstanceId, request: &StartRequest) -> ControlResult<()> {
        self.command(id, Endpoint::Start, request).await
    }

    async fn stop(&self, id: &InstanceId) -> ControlResult<()> {
        self.command(id, Endpoint::Stop, &EmptyRequest {}).await
    }

    async fn progress(&self, id: &InstanceId) -> ControlResult<Option<Progress>> {
        let url = self.url(id, Endpoint::Progress)?;
        trace!("GET {url}");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Self::map_error(id, Endpoint::Progress, e))?;

        let answer: ProgressResponse = Self::read_json(id, Endpoint::Progress, response).await?;
        trace!("Progress for instance {id}: {:?}", answer.progress);
        Ok(answer.progress)
    }

    async fn commit(&self, id: &InstanceId) -> ControlResult<()> {
        self.command(id, Endpoint::Commit, &EmptyRequest {}).await
    }

    async fn reverse(&self, id: &InstanceId) -> ControlResult<()> {
        self.command(id, Endpoint::Reverse, &EmptyRequest {}).await
    }
}
