mod formatters;

pub use formatters::{JsonFormatter, TextFormatter};

use crate::server::handlers::{HealthCheckResponse, OperationResponse};
use crate::terminal;
use anyhow::Result;
use syncpilot_core::InstanceSnapshot;

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    /// Parse output format from string
    pub fn from_string(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => anyhow::bail!("Unknown output format: {}", s),
        }
    }

    /// JSON when asked for or when stdout is not a terminal
    pub fn detect(force_json: bool) -> Self {
        if force_json || !terminal::is_interactive() {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Trait for output formatters
pub trait OutputFormatter: Send + Sync {
    /// Format one instance snapshot
    fn format_snapshot(&self, snapshot: &InstanceSnapshot) -> Result<String>;

    /// Format a listing of instances
    fn format_snapshots(&self, snapshots: &[InstanceSnapshot]) -> Result<String> {
        let formatted: Result<Vec<String>> =
            snapshots.iter().map(|s| self.format_snapshot(s)).collect();

        Ok(formatted?.join("\n"))
    }

    /// Format the answer to an operator operation
    fn format_operation(&self, response: &OperationResponse) -> Result<String>;

    fn format_health(&self, health: &HealthCheckResponse) -> Result<String>;
}

/// Create a formatter based on output format
pub fn create_formatter(format: OutputFormat, use_color: bool) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter::new(use_color)),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
    }
}
