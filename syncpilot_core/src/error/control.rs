//! Control API call errors

use thiserror::Error;

/// Failure of a single call to an instance's control API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// Connection refused, reset, DNS failure and similar transport problems
    #[error("Control API of instance '{instance}' unreachable during {endpoint}: {message}")]
    Transport {
        instance: String,
        endpoint: String,
        message: String,
    },

    /// The request did not complete within the configured timeout
    #[error("Control API call {endpoint} on instance '{instance}' timed out")]
    Timeout { instance: String, endpoint: String },

    /// Non-2xx HTTP status
    #[error("Control API call {endpoint} on instance '{instance}' returned HTTP {status}")]
    HttpStatus {
        instance: String,
        endpoint: String,
        status: u16,
    },

    /// Body was not the expected JSON document
    #[error("Malformed response to {endpoint} from instance '{instance}': {message}")]
    Decode {
        instance: String,
        endpoint: String,
        message: String,
    },

    /// The instance answered `{"success": false}`
    #[error("Instance '{instance}' refused {endpoint}")]
    Rejected { instance: String, endpoint: String },

    /// No base address is configured for the instance
    #[error("No control API address configured for instance '{instance}'")]
    NotConfigured { instance: String },
}

impl ControlError {
    /// Create a transport error
    pub fn transport(instance: &str, endpoint: &str, message: impl Into<String>) -> Self {
        Self::Transport {
            instance: instance.to_string(),
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(instance: &str, endpoint: &str) -> Self {
        Self::Timeout {
            instance: instance.to_string(),
            endpoint: endpoint.to_string(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(instance: &str, endpoint: &str, status: u16) -> Self {
        Self::HttpStatus {
            instance: instance.to_string(),
            endpoint: endpoint.to_string(),
            status,
        }
    }

    /// Create a decode error
    pub fn decode(instance: &str, endpoint: &str, message: impl Into<String>) -> Self {
        Self::Decode {
            instance: instance.to_string(),
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }

    /// Create a rejected-call error
    pub fn rejected(instance: &str, endpoint: &str) -> Self {
        Self::Rejected {
            instance: instance.to_string(),
            endpoint: endpoint.to_string(),
        }
    }

    /// Create a missing-address error
    pub fn not_configured(instance: &str) -> Self {
        Self::NotConfigured {
            instance: instance.to_string(),
        }
    }

    /// Check if retrying the same call later may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout { .. } | Self::Decode { .. } => true,
            Self::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            Self::Rejected { .. } | Self::NotConfigured { .. } => false,
        }
    }

    /// Instance the failed call was addressed to
    pub fn instance(&self) -> &str {
        match self {
            Self::Transport { instance, .. }
            | Self::Timeout { instance, .. }
            | Self::HttpStatus { instance, .. }
            | Self::Decode { instance, .. }
            | Self::Rejected { instance, .. }
            | Self::NotConfigured { instance } => instance,
        }
    }
}
