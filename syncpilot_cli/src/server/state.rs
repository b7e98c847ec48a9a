//! Application state for API handlers

use chrono::{DateTime, Utc};
use syncpilot_core::SyncController;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// State machine driver
    pub controller: SyncController,

    /// Orchestrator version
    pub version: String,

    /// Orchestrator start time
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(controller: SyncController) -> Self {
        Self {
            controller,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Utc::now(),
        }
    }

    /// Time since start, e.g. `2h 5m 17s`
    pub fn uptime(&self) -> String {
        format_uptime((Utc::now() - self.started_at).num_seconds().max(0))
    }
}

fn format_uptime(total_seconds: i64) -> String {
    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m {seconds}s")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
