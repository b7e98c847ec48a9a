//! Control API request and response bodies

use crate::progress::Progress;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Control API endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Start,
    Stop,
    Progress,
    Commit,
    Reverse,
}

impl Endpoint {
    /// Path relative to the instance base URL
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Start => "/start",
            Endpoint::Stop => "/stop",
            Endpoint::Progress => "/progress",
            Endpoint::Commit => "/commit",
            Endpoint::Reverse => "/reverse",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::Start => "start",
            Endpoint::Stop => "stop",
            Endpoint::Progress => "progress",
            Endpoint::Commit => "commit",
            Endpoint::Reverse => "reverse",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Body of `POST /start`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub source: String,
    pub destination: String,
    pub reversible: bool,
    pub enable_user_write_blocking: bool,
}

impl Default for StartRequest {
    fn default() -> Self {
        Self {
            source: "cluster0".to_string(),
            destination: "cluster1".to_string(),
            reversible: true,
            enable_user_write_blocking: true,
        }
    }
}

/// Body of `POST /stop`, `/commit` and `/reverse`
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EmptyRequest {}

/// Answer to a command endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Missing counts as a refusal
    #[serde(default)]
    pub success: bool,
}

/// Answer to `GET /progress`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressResponse {
    #[serde(default)]
    pub progress: Option<Progress>,
}
