//! HTTP client for a running orchestrator
//!
//! Used by the `instance` subcommands to talk to `syncpilot serve`.

use crate::server::ErrorResponse;
use crate::server::handlers::{HealthCheckResponse, OperationResponse};
use log::debug;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use syncpilot_core::{InstanceId, InstanceSnapshot, Operation};
use thiserror::Error;

/// Failures talking to the orchestrator
#[derive(Debug, Error)]
pub enum ClientError {
    /// The orchestrator could not be reached
    #[error("Cannot reach orchestrator at {url}: {message}")]
    Connection { url: String, message: String },

    /// The orchestrator answered with an error document
    #[error("{message}")]
    Api {
        status: u16,
        code: String,
        message: String,
        /// Instance the failure concerns, when the orchestrator named one
        instance: Option<String>,
    },

    /// The answer was not the expected JSON document
    #[error("Unexpected response from orchestrator: {0}")]
    Decode(String),
}

impl ClientError {
    /// Machine-readable code of an API error
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Client for the orchestrator HTTP surface
pub struct OrchestratorClient {
    http: reqwest::Client,
    base: Url,
    base_url: String,
}

impl OrchestratorClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base = Url::parse(base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| ClientError::Connection {
                url: base_url.to_string(),
                message: "not a valid http(s) base URL".to_string(),
            })?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Connection {
                url: base_url.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            http,
            base,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run a mutating operation
    pub async fn execute(
        &self,
        operation: Operation,
        id: &InstanceId,
    ) -> Result<OperationResponse, ClientError> {
        let route = match operation {
            Operation::Start => "start_sync",
            Operation::Stop => "stop_sync",
            Operation::Commit => "commit_sync",
            Operation::Reverse => "reverse_sync",
            Operation::Query => {
                let snapshot = self.status(id).await?;
                return Ok(OperationResponse {
                    success: true,
                    message: format!("Status refreshed for instance {id}"),
                    instance: id.clone(),
                    snapshot,
                });
            }
        };
        let url = self.url(&[route, id.as_str()])?;
        debug!("POST {url}");

        let response = self
            .http
            .post(url)
            .send()
            .await
            .map_err(|e| self.connection_error(e))?;
        Self::read(response).await
    }

    /// Refresh and read one instance
    pub async fn status(&self, id: &InstanceId) -> Result<InstanceSnapshot, ClientError> {
        self.get(&["sync_status", id.as_str()]).await
    }

    /// Last known state of every instance
    pub async fn list(&self) -> Result<Vec<InstanceSnapshot>, ClientError> {
        self.get(&["instances"]).await
    }

    pub async fn health(&self) -> Result<HealthCheckResponse, ClientError> {
        self.get(&["health"]).await
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ClientError> {
        let url = self.url(segments)?;
        debug!("GET {url}");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.connection_error(e))?;
        Self::read(response).await
    }

    /// Append percent-encoded path segments to the base URL
    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Connection {
                url: self.base_url.clone(),
                message: "base URL cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn connection_error(&self, error: reqwest::Error) -> ClientError {
        ClientError::Connection {
            url: self.base_url.clone(),
            message: error.to_string(),
        }
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        if status.is_success() {
            return serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()));
        }

        match serde_json::from_slice::<ErrorResponse>(&body) {
            Ok(error) => Err(ClientError::Api {
                status: status.as_u16(),
                code: error.code,
                message: error.error,
                instance: error.instance,
            }),
            Err(_) => Err(ClientError::Api {
                status: status.as_u16(),
                code: default_code(status).to_string(),
                message: format!("Orchestrator returned HTTP {status}"),
                instance: None,
            }),
        }
    }
}

fn default_code(status: StatusCode) -> &'static str {
    match status {
        StatusCode::NOT_FOUND => "NOT_FOUND",
        StatusCode::CONFLICT => "CONFLICT",
        s if s.is_server_error() => "SERVER_ERROR",
        _ => "HTTP_ERROR",
    }
}
