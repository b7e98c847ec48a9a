use super::OutputFormatter;
use crate::server::handlers::{HealthCheckResponse, OperationResponse};
use anyhow::Result;
use colored::*;
use serde::Serialize;
use serde_json::Value;
use syncpilot_core::{InstanceSnapshot, Phase};

/// Text formatter for human-readable output
pub struct TextFormatter {
    use_color: bool,
}

impl TextFormatter {
    pub fn new(use_color: bool) -> Self {
        Self { use_color }
    }

    fn colorize(&self, text: &str, color: fn(&str) -> ColoredString) -> String {
        if self.use_color {
            color(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn phase(&self, phase: Phase) -> String {
        let color: fn(&str) -> ColoredString = match phase {
            Phase::Idle => |s: &str| s.dimmed(),
            Phase::Running => |s: &str| s.cyan(),
            Phase::Stopped => |s: &str| s.yellow(),
            Phase::Committed => |s: &str| s.green(),
            Phase::Reversed => |s: &str| s.magenta(),
        };
        self.colorize(phase.as_str(), color)
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl OutputFormatter for TextFormatter {
    fn format_snapshot(&self, snapshot: &InstanceSnapshot) -> Result<String> {
        let mut output = String::new();

        output.push_str(&format!(
            "Instance: {}\n",
            self.colorize(snapshot.instance.as_str(), |s| s.bold())
        ));
        output.push_str(&format!("Phase: {}\n", self.phase(snapshot.phase)));
        output.push_str(&format!(
            "Monitoring: {}\n",
            if snapshot.monitoring { "yes" } else { "no" }
        ));

        match snapshot.last_update {
            Some(at) => output.push_str(&format!(
                "Last update: {}\n",
                at.format("%Y-%m-%d %H:%M:%S UTC")
            )),
            None => output.push_str("Last update: never\n"),
        }

        if !snapshot.progress.is_empty() {
            output.push_str("\nProgress:\n");

            // Sort keys for consistent output
            let mut fields: Vec<_> = snapshot.progress.fields().iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));

            for (key, value) in fields {
                let key_str = self.colorize(key, |s| s.yellow());
                output.push_str(&format!("  {key_str}: {}\n", display_value(value)));
            }
        }

        Ok(output)
    }

    fn format_snapshots(&self, snapshots: &[InstanceSnapshot]) -> Result<String> {
        if snapshots.is_empty() {
            return Ok("No instances configured.\n".to_string());
        }

        let mut output = format!(
            "{:<12} {:<10} {:>8}  {}\n",
            "INSTANCE", "PHASE", "LAG", "MONITORING"
        );
        for snapshot in snapshots {
            let lag = snapshot
                .progress
                .lag_seconds()
                .map(|lag| format!("{lag}s"))
                .unwrap_or_else(|| "-".to_string());
            // Pad before coloring so escape codes don't skew the columns
            let phase = format!("{:<10}", snapshot.phase.as_str());
            let phase = if self.use_color {
                self.phase(snapshot.phase)
                    + &" ".repeat(10 - snapshot.phase.as_str().len())
            } else {
                phase
            };
            output.push_str(&format!(
                "{:<12} {} {:>8}  {}\n",
                snapshot.instance.as_str(),
                phase,
                lag,
                if snapshot.monitoring { "yes" } else { "no" }
            ));
        }

        Ok(output)
    }

    fn format_operation(&self, response: &OperationResponse) -> Result<String> {
        let marker = self.colorize("✓", |s| s.green());
        Ok(format!(
            "{marker} {}\n  Phase: {}\n",
            response.message,
            self.phase(response.snapshot.phase)
        ))
    }

    fn format_health(&self, health: &HealthCheckResponse) -> Result<String> {
        Ok(format!(
            "Status: {}\nVersion: {}\nUptime: {}\n",
            self.colorize(&health.status, |s| s.green()),
            health.version,
            health.uptime
        ))
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        if self.pretty {
            Ok(serde_json::to_string_pretty(value)?)
        } else {
            Ok(serde_json::to_string(value)?)
        }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_snapshot(&self, snapshot: &InstanceSnapshot) -> Result<String> {
        self.render(snapshot)
    }

    fn format_snapshots(&self, snapshots: &[InstanceSnapshot]) -> Result<String> {
        self.render(snapshots)
    }

    fn format_operation(&self, response: &OperationResponse) -> Result<String> {
        self.render(response)
    }

    fn format_health(&self, health: &HealthCheckResponse) -> Result<String> {
        self.render(health)
    }
}
