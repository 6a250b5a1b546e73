//! Error taxonomy for the flyerflow engine.
//!
//! Every failure path returns one of these variants; nothing in the engine
//! panics or retries. The axum `IntoResponse` impl is the single place
//! errors are mapped to HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::AssignmentStatus;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Forbidden(String),

    #[error("Invalid authentication credentials")]
    Unauthorized,

    #[error(
        "Invalid status transition from {from} to {to}. Allowed transitions: {}",
        allowed.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
    )]
    InvalidTransition {
        from: AssignmentStatus,
        to: AssignmentStatus,
        allowed: Vec<AssignmentStatus>,
    },

    #[error("This volunteer is already assigned to this zone")]
    DuplicateAssignment,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidGeometry(_) | Error::Validation(_) | Error::InvalidTransition { .. } => {
                StatusCode::BAD_REQUEST
            }
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::DuplicateAssignment | Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Storage(_) | Error::Serde(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_message_lists_allowed_targets() {
        let err = Error::InvalidTransition {
            from: AssignmentStatus::Assigned,
            to: AssignmentStatus::Completed,
            allowed: vec![AssignmentStatus::InProgress],
        };
        assert_eq!(
            err.to_string(),
            "Invalid status transition from assigned to completed. Allowed transitions: in_progress"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            Error::DuplicateAssignment.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(Error::NotFound("Zone").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::InvalidGeometry("ring".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
