//! Instance control API
//!
//! This module describes the HTTP contract every backend instance exposes:
//! - `messages`: request and response bodies plus the endpoint table
//! - `client`: reqwest-backed implementation of [`ControlApi`]

pub mod client;
pub mod messages;

pub use client::{HttpClientConfig, HttpControlClient};
pub use messages::{CommandResponse, Endpoint, ProgressResponse, StartRequest};

use crate::error::ControlError;
use crate::progress::Progress;
use crate::registry::InstanceId;
use async_trait::async_trait;

/// Result of a single control API call
pub type ControlResult<T> = std::result::Result<T, ControlError>;

/// Default path prefix of the control API on every instance
pub const DEFAULT_API_PREFIX: &str = "/api/v1";

/// Default host the instances listen on
pub const DEFAULT_HOST: &str = "localhost";

/// Ports of the default three-instance deployment
pub const DEFAULT_INSTANCE_PORTS: [u16; 3] = [27601, 27602, 27603];

/// Base URL of an instance listening on `port` on the default host
pub fn default_base_url(port: u16) -> String {
    format!("http://{DEFAULT_HOST}:{port}{DEFAULT_API_PREFIX}")
}

/// The narrow set of calls the orchestrator makes against an instance
///
/// Every method performs exactly one request. A `{"success": false}` answer
/// is reported as [`ControlError::Rejected`], so `Ok(())` always means the
/// instance accepted the command.
#[async_trait]
pub trait ControlApi: Send + Sync {
    /// Begin replication
    async fn start(&self, id: &InstanceId, request: &StartRequest) -> ControlResult<()>;

    /// Halt replication
    async fn stop(&self, id: &InstanceId) -> ControlResult<()>;

    /// Read the current progress report
    ///
    /// Returns `Ok(None)` when the answer carries no `progress` document.
    async fn progress(&self, id: &InstanceId) -> ControlResult<Option<Progress>>;

    /// Cut over to the destination
    async fn commit(&self, id: &InstanceId) -> ControlResult<()>;

    /// Invert the replication direction
    async fn reverse(&self, id: &InstanceId) -> ControlResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_base_url() {
        assert_eq!(default_base_url(27601), "http://localhost:27601/api/v1");
    }

    #[test]
    fn test_default_ports() {
        assert_eq!(DEFAULT_INSTANCE_PORTS, [27601, 27602, 27603]);
    }
}
