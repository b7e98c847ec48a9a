//! State machine rejection errors

use crate::phase::{Operation, Phase};
use thiserror::Error;

/// Operation refused before any external call was made
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The operation is not valid from the instance's current phase
    #[error("Cannot {operation} instance '{instance}' while it is {phase}")]
    InvalidTransition {
        instance: String,
        operation: Operation,
        phase: Phase,
    },

    /// Another operation on the same instance has not finished yet
    #[error("Cannot {operation} instance '{instance}': {pending} is still in progress")]
    OperationInProgress {
        instance: String,
        operation: Operation,
        pending: Operation,
    },
}

impl TransitionError {
    /// Create an invalid transition error
    pub fn invalid(instance: &str, operation: Operation, phase: Phase) -> Self {
        Self::InvalidTransition {
            instance: instance.to_string(),
            operation,
            phase,
        }
    }

    /// Create an operation-in-progress error
    pub fn in_progress(instance: &str, operation: Operation, pending: Operation) -> Self {
        Self::OperationInProgress {
            instance: instance.to_string(),
            operation,
            pending,
        }
    }

    /// Operation that was refused
    pub fn operation(&self) -> Operation {
        match self {
            Self::InvalidTransition { operation, .. }
            | Self::OperationInProgress { operation, .. } => *operation,
        }
    }

    /// Instance the operation was aimed at
    pub fn instance(&self) -> &str {
        match self {
            Self::InvalidTransition { instance, .. }
            | Self::OperationInProgress { instance, .. } => instance,
        }
    }
}
