use crate::client::ClientError;
use colored::*;
use std::error::Error as StdError;
use std::fmt;

/// CLI-specific error type with semantic exit codes
#[derive(Debug)]
pub struct CliError {
    /// The main error message
    message: String,

    /// Error category for exit code determination
    category: ErrorCategory,

    /// Additional context information
    context: Vec<(String, String)>,

    /// Suggestions for recovery
    pub suggestions: Vec<String>,

    /// Source error if any
    source: Option<Box<dyn StdError + Send + Sync>>,
}

/// Error categories that map to exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorCategory {
    General,
    Network,
    Config,
    Rejected,
}

/// Semantic exit codes for the CLI
///
/// Exit code 2 is left to clap for command-line usage errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    GeneralError = 1,
    NetworkError = 3,
    ConfigError = 4,
    /// The orchestrator refused the operation (unknown instance, wrong phase, busy)
    Rejected = 5,
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Extension trait for adding context to errors
pub trait ErrorContext {
    fn with_context(self, key: &str, value: &str) -> Self;
    fn with_source(self, source: Box<dyn StdError + Send + Sync>) -> Self;
}

impl CliError {
    fn with_category(message: &str, category: ErrorCategory) -> Self {
        Self {
            message: message.to_string(),
            category,
            context: Vec::new(),
            suggestions: Vec::new(),
            source: None,
        }
    }

    /// Create a general error
    pub fn general(message: &str) -> Self {
        Self::with_category(message, ErrorCategory::General)
    }

    /// Create a network error
    pub fn network(message: &str) -> Self {
        let mut error = Self::with_category(message, ErrorCategory::Network);
        error.suggestions = vec![
            "Check that 'syncpilot serve' is running".to_string(),
            "Verify client.server_url with 'syncpilot config get client.server_url'".to_string(),
        ];
        error
    }

    /// Create a configuration error
    pub fn config(message: &str) -> Self {
        let mut error = Self::with_category(message, ErrorCategory::Config);
        error
            .suggestions
            .push("Run 'syncpilot config list' to inspect the effective settings".to_string());
        error
    }

    /// Create an error for an operation the orchestrator refused
    pub fn rejected(message: &str) -> Self {
        Self::with_category(message, ErrorCategory::Rejected)
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        match self.category {
            ErrorCategory::General => ExitCode::GeneralError,
            ErrorCategory::Network => ExitCode::NetworkError,
            ErrorCategory::Config => ExitCode::ConfigError,
            ErrorCategory::Rejected => ExitCode::Rejected,
        }
    }

    fn label(&self) -> &'static str {
        match self.category {
            ErrorCategory::General => "Error",
            ErrorCategory::Network => "Network Error",
            ErrorCategory::Config => "Config Error",
            ErrorCategory::Rejected => "Rejected",
        }
    }

    /// Format the error for user display
    pub fn format_for_user(&self, debug: bool) -> String {
        let mut output = String::new();

        let prefix = match self.category {
            ErrorCategory::Rejected => self.label().yellow(),
            _ => self.label().red(),
        };

        output.push_str(&format!("{}: {}\n", prefix, self.message));

        if !self.context.is_empty() {
            output.push_str("\nContext:\n");
            for (key, value) in &self.context {
                output.push_str(&format!("  {}: {}\n", key.bold(), value));
            }
        }

        // Error chain in debug mode
        if debug && let Some(source) = &self.source {
            output.push_str("\nCaused by:\n");
            let mut current: Option<&dyn StdError> = Some(source.as_ref());
            let mut level = 1;

            while let Some(err) = current {
                output.push_str(&format!("  {level}: {err}\n"));
                current = err.source();
                level += 1;
            }
        }

        if !self.suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in &self.suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }

        output
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label(), self.message)?;

        for (key, value) in &self.context {
            write!(f, " ({key}: {value})")?;
        }

        Ok(())
    }
}

impl StdError for CliError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl ErrorContext for CliError {
    fn with_context(mut self, key: &str, value: &str) -> Self {
        self.context.push((key.to_string(), value.to_string()));
        self
    }

    fn with_source(mut self, source: Box<dyn StdError + Send + Sync>) -> Self {
        self.source = Some(source);
        self
    }
}

impl From<ClientError> for CliError {
    fn from(error: ClientError) -> Self {
        let message = error.to_string();
        match error {
            ClientError::Connection { url, message: detail } => {
                let source = ClientError::Connection {
                    url: url.clone(),
                    message: detail,
                };
                Self::network(&message)
                    .with_context("server", &url)
                    .with_source(Box::new(source))
            }
            ClientError::Api {
                status,
                code,
                instance,
                ..
            } => {
                let base = match status {
                    404 | 409 => Self::rejected(&message),
                    // Instance control API failed behind the orchestrator
                    502 => Self::network(&message),
                    _ => Self::general(&message),
                };
                let base = match &instance {
                    Some(instance) => base.with_context("instance", instance),
                    None => base,
                };
                let mut cli_error = base
                    .with_context("code", &code)
                    .with_context("status", &status.to_string());
                if code == "UNKNOWN_INSTANCE" {
                    cli_error.suggestions = vec![
                        "Run 'syncpilot instance list' to see configured instances".to_string(),
                    ];
                } else if code == "INVALID_TRANSITION" || code == "OPERATION_IN_PROGRESS" {
                    cli_error.suggestions = vec![
                        "Run 'syncpilot instance status <id>' to see the current phase".to_string(),
                    ];
                }
                cli_error
            }
            ClientError::Decode(detail) => {
                Self::general(&message).with_source(Box::new(ClientError::Decode(detail)))
            }
        }
    }
}

/// Convert anyhow errors to CLI errors
impl From<anyhow::Error> for CliError {
    fn from(error: anyhow::Error) -> Self {
        Self::general(&format!("{error:#}"))
    }
}
