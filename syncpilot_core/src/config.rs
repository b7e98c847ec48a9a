//! Orchestrator configuration
//!
//! Loaded once at startup and immutable afterwards. The CLI layers this
//! structure from defaults, a TOML file and environment variables.

use crate::control::{
    DEFAULT_INSTANCE_PORTS, HttpClientConfig, HttpControlClient, StartRequest, default_base_url,
};
use crate::controller::{ControllerConfig, SyncController};
use crate::error::{Result, ValidationError};
use crate::progress::CommitPolicy;
use crate::registry::{InstanceId, InstanceRegistry};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// One backend instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub id: InstanceId,
    /// Control API root, e.g. `http://localhost:27601/api/v1`
    pub base_url: String,
}

impl InstanceConfig {
    pub fn new(id: impl Into<InstanceId>, base_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
        }
    }

    /// Instance on the default host, identified by its port
    pub fn local(port: u16) -> Self {
        Self::new(port, default_base_url(port))
    }
}

/// Start payload settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartSettings {
    pub source: String,
    pub destination: String,
    pub reversible: bool,
    pub enable_user_write_blocking: bool,
}

impl Default for StartSettings {
    fn default() -> Self {
        StartRequest::default().into()
    }
}

impl From<StartRequest> for StartSettings {
    fn from(request: StartRequest) -> Self {
        Self {
            source: request.source,
            destination: request.destination,
            reversible: request.reversible,
            enable_user_write_blocking: request.enable_user_write_blocking,
        }
    }
}

impl From<&StartSettings> for StartRequest {
    fn from(settings: &StartSettings) -> Self {
        Self {
            source: settings.source.clone(),
            destination: settings.destination.clone(),
            reversible: settings.reversible,
            enable_user_write_blocking: settings.enable_user_write_blocking,
        }
    }
}

/// Core orchestrator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub instances: Vec<InstanceConfig>,
    pub poll_interval_seconds: u64,
    pub request_timeout_seconds: u64,
    pub commit: CommitPolicy,
    pub start: StartSettings,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            instances: DEFAULT_INSTANCE_PORTS
                .iter()
                .map(|&port| InstanceConfig::local(port))
                .collect(),
            poll_interval_seconds: 5,
            request_timeout_seconds: 10,
            commit: CommitPolicy::default(),
            start: StartSettings::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Reject settings the controller cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.instances.is_empty() {
            return Err(
                ValidationError::invalid_configuration("at least one instance is required").into(),
            );
        }

        let mut seen = HashSet::new();
        for instance in &self.instances {
            if instance.id.as_str().trim().is_empty() {
                return Err(ValidationError::invalid_parameter(
                    "instances.id",
                    "must not be empty",
                )
                .into());
            }
            if !seen.insert(&instance.id) {
                return Err(ValidationError::duplicate_instance(instance.id.as_str()).into());
            }
            validate_base_url(instance)?;
        }

        if self.poll_interval_seconds == 0 {
            return Err(ValidationError::invalid_parameter(
                "poll_interval_seconds",
                "must be greater than 0",
            )
            .into());
        }
        if self.request_timeout_seconds == 0 {
            return Err(ValidationError::invalid_parameter(
                "request_timeout_seconds",
                "must be greater than 0",
            )
            .into());
        }

        let threshold = self.commit.max_lag_seconds;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ValidationError::invalid_parameter(
                "commit.max_lag_seconds",
                "must be a finite number >= 0",
            )
            .into());
        }

        Ok(())
    }

    pub fn instance_ids(&self) -> Vec<InstanceId> {
        self.instances.iter().map(|i| i.id.clone()).collect()
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            poll_interval: Duration::from_secs(self.poll_interval_seconds),
            commit_policy: self.commit,
            start_request: StartRequest::from(&self.start),
        }
    }

    pub fn http_client_config(&self) -> HttpClientConfig {
        let request_timeout = Duration::from_secs(self.request_timeout_seconds);
        HttpClientConfig {
            request_timeout,
            connect_timeout: request_timeout.min(HttpClientConfig::default().connect_timeout),
        }
    }

    /// Validate and build a controller talking HTTP to the configured instances
    pub fn build_controller(&self) -> Result<SyncController> {
        self.validate()?;

        let client = HttpControlClient::new(
            self.instances
                .iter()
                .map(|i| (i.id.clone(), i.base_url.clone())),
            &self.http_client_config(),
        )?;
        let registry = Arc::new(InstanceRegistry::new(self.instance_ids()));

        Ok(SyncController::new(
            registry,
            Arc::new(client),
            self.controller_config(),
        ))
    }
}

fn validate_base_url(instance: &InstanceConfig) -> Result<()> {
    let url = reqwest::Url::parse(&instance.base_url).map_err(|e| {
        ValidationError::invalid_parameter(
            "instances.base_url",
            &format!("'{}' for instance {}: {e}", instance.base_url, instance.id),
        )
    })?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ValidationError::invalid_parameter(
            "instances.base_url",
            &format!("unsupported scheme '{scheme}' for instance {}", instance.id),
        )
        .into()),
    }
}
