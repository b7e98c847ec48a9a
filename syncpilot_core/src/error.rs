//! Error types for the syncpilot core library
//!
//! Errors are grouped by where they originate so callers can map them to a
//! response without inspecting messages.

use crate::registry::InstanceId;
use thiserror::Error;

pub mod control;
pub mod transition;
pub mod validation;

pub use self::control::ControlError;
pub use self::transition::TransitionError;
pub use self::validation::ValidationError;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the syncpilot core library
///
/// Errors are categorized into the following types:
/// - Control errors: a call to an instance's control API failed
/// - Transition errors: the operation is not allowed from the current phase
/// - Unknown instance: the identifier is not part of the configuration
/// - Validation errors: configuration and input validation
/// - Internal errors: an operation task ended without producing a result
#[derive(Error, Debug)]
pub enum Error {
    /// External control API failure
    #[error(transparent)]
    Control(#[from] ControlError),

    /// Operation rejected by the state machine
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Instance identifier is not configured
    #[error("Unknown instance: {id}")]
    UnknownInstance { id: String },

    /// Configuration or input validation failure
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Internal failure
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Create an unknown instance error
    pub fn unknown_instance(id: &InstanceId) -> Self {
        Self::UnknownInstance {
            id: id.to_string(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Instance the error concerns, when there is one
    pub fn instance(&self) -> Option<&str> {
        match self {
            Self::Control(e) => Some(e.instance()),
            Self::Transition(e) => Some(e.instance()),
            Self::UnknownInstance { id } => Some(id),
            Self::Validation(_) | Self::Internal { .. } => None,
        }
    }

    /// True when the request named an instance that is not configured
    pub fn is_unknown_instance(&self) -> bool {
        matches!(self, Self::UnknownInstance { .. })
    }

    /// True when the state machine refused the operation before any external call
    pub fn is_rejected_transition(&self) -> bool {
        matches!(self, Self::Transition(_))
    }

    /// True when the control API call itself failed
    pub fn is_control_failure(&self) -> bool {
        matches!(self, Self::Control(_))
    }
}
