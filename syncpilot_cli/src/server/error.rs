//! HTTP error mapping

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use syncpilot_core::{Error, InstanceId, TransitionError};
use thiserror::Error;

/// Errors returned by the orchestrator HTTP surface
#[derive(Debug, Error)]
pub enum ApiError {
    /// Instance identifier is not configured
    #[error("Unknown instance: {instance}")]
    UnknownInstance { instance: String },

    /// Operation not allowed from the current phase
    #[error("{message}")]
    InvalidTransition { instance: String, message: String },

    /// Another operation holds the instance
    #[error("{message}")]
    OperationInProgress { instance: String, message: String },

    /// The instance's control API failed or refused the call
    #[error("{message}")]
    Upstream { instance: String, message: String },

    /// Internal error
    #[error("Internal error: {message}")]
    Internal {
        instance: Option<String>,
        message: String,
    },
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `false`; mirrors `OperationResponse::success`
    #[serde(default)]
    pub success: bool,
    pub error: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl ApiError {
    /// Status code and machine-readable code
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::UnknownInstance { .. } => (StatusCode::NOT_FOUND, "UNKNOWN_INSTANCE"),
            ApiError::InvalidTransition { .. } => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
            ApiError::OperationInProgress { .. } => {
                (StatusCode::CONFLICT, "OPERATION_IN_PROGRESS")
            }
            ApiError::Upstream { .. } => (StatusCode::BAD_GATEWAY, "CONTROL_API_FAILURE"),
            ApiError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// Instance the failure concerns
    pub fn instance(&self) -> Option<&str> {
        match self {
            ApiError::UnknownInstance { instance }
            | ApiError::InvalidTransition { instance, .. }
            | ApiError::OperationInProgress { instance, .. }
            | ApiError::Upstream { instance, .. } => Some(instance),
            ApiError::Internal { instance, .. } => instance.as_deref(),
        }
    }

    /// Attach the requested instance to an error that does not name one
    pub fn for_instance(self, id: &InstanceId) -> Self {
        match self {
            ApiError::Internal {
                instance: None,
                message,
            } => ApiError::Internal {
                instance: Some(id.to_string()),
                message,
            },
            other => other,
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let message = error.to_string();
        let instance = error.instance().map(str::to_string);
        match error {
            Error::UnknownInstance { id } => ApiError::UnknownInstance { instance: id },
            Error::Transition(TransitionError::InvalidTransition { instance, .. }) => {
                ApiError::InvalidTransition { instance, message }
            }
            Error::Transition(TransitionError::OperationInProgress { instance, .. }) => {
                ApiError::OperationInProgress { instance, message }
            }
            Error::Control(e) => ApiError::Upstream {
                instance: e.instance().to_string(),
                message,
            },
            Error::Validation(_) | Error::Internal { .. } => ApiError::Internal { instance, message },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            code: code.to_string(),
            instance: self.instance().map(str::to_string),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use syncpilot_core::{ControlError, Operation, Phase};

    #[test]
    fn test_status_codes() {
        let unknown: ApiError = Error::unknown_instance(&InstanceId::from("x")).into();
        assert_eq!(unknown.into_response().status(), StatusCode::NOT_FOUND);

        let invalid: ApiError =
            Error::from(TransitionError::invalid("a", Operation::Commit, Phase::Idle)).into();
        assert_eq!(invalid.into_response().status(), StatusCode::CONFLICT);

        let busy: ApiError =
            Error::from(TransitionError::in_progress("a", Operation::Stop, Operation::Start))
                .into();
        assert_eq!(busy.status_and_code().1, "OPERATION_IN_PROGRESS");

        let upstream: ApiError = Error::from(ControlError::rejected("a", "start")).into();
        assert_eq!(upstream.instance(), Some("a"));
        assert_eq!(upstream.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_internal_error_takes_requested_instance() {
        let error = ApiError::from(Error::internal("start on instance 27601 panicked"))
            .for_instance(&InstanceId::from("27601"));

        assert_eq!(error.instance(), Some("27601"));
        assert_eq!(error.status_and_code().1, "INTERNAL_ERROR");
    }

    #[test]
    fn test_message_is_kept() {
        let error: ApiError =
            Error::from(TransitionError::invalid("27601", Operation::Start, Phase::Running)).into();
        assert_eq!(
            error.to_string(),
            "Cannot start instance '27601' while it is running"
        );
    }
}
