//! # Web API Error Types
//!
//! Error envelope for the HTTP surface. Every failure serializes as
//! `{ "error": { "code", "message" } }` with a stable machine-readable code,
//! so clients can branch on `code` without parsing messages.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::error::SchedulerError;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Web API errors with HTTP status code mappings
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    BadRequest {
        code: &'static str,
        message: String,
    },

    #[error("{message}")]
    NotFound {
        code: &'static str,
        message: String,
    },

    /// The request addressed a task whose state no longer permits it
    #[error("{message}")]
    Conflict {
        code: &'static str,
        message: String,
    },

    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("{message}")]
    Internal {
        code: &'static str,
        message: String,
    },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            code: "validation_failed",
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            code: "task_not_found",
            message: message.into(),
        }
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    pub fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self::Internal {
            code,
            message: message.into(),
        }
    }

    /// Map a scheduler failure into the envelope, attributing database
    /// failures to the operation that triggered them (`schedule_failed`,
    /// `dequeue_failed`, ...). Client-caused failures keep their own codes.
    pub fn from_scheduler(err: SchedulerError, operation_code: &'static str) -> Self {
        match err {
            SchedulerError::Validation(message) => Self::BadRequest {
                code: "validation_failed",
                message,
            },
            SchedulerError::TaskNotFound(task_id) => Self::NotFound {
                code: "task_not_found",
                message: format!("task {task_id} not found"),
            },
            SchedulerError::NotStarted(task_id) => Self::Conflict {
                code: "not_started",
                message: format!("task {task_id} is not started"),
            },
            SchedulerError::InvalidTransition {
                task_id,
                state,
                target,
            } => Self::Conflict {
                code: "invalid_transition",
                message: format!("task {task_id} is {state}, cannot transition to {target}"),
            },
            SchedulerError::Database(cause) => {
                error!(error = %cause, code = operation_code, "database failure behind API request");
                Self::Internal {
                    code: operation_code,
                    message: "internal database failure".to_string(),
                }
            }
            SchedulerError::Configuration(message) => Self::Internal {
                code: "configuration_error",
                message,
            },
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::BadRequest { code, .. }
            | Self::NotFound { code, .. }
            | Self::Conflict { code, .. }
            | Self::Internal { code, .. } => code,
            Self::ServiceUnavailable { .. } => "service_unavailable",
        }
    }
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        Self::from_scheduler(err, "internal_error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_scheduler_errors_keep_their_codes() {
        let err = ApiError::from_scheduler(
            SchedulerError::Validation("limit must be positive".into()),
            "dequeue_failed",
        );
        assert_eq!(err.code(), "validation_failed");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = ApiError::from_scheduler(
            SchedulerError::TaskNotFound(Uuid::new_v4()),
            "dequeue_failed",
        );
        assert_eq!(err.code(), "task_not_found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_database_errors_take_the_operation_code() {
        let err = ApiError::from_scheduler(
            SchedulerError::Database(sqlx::Error::PoolClosed),
            "schedule_failed",
        );
        assert_eq!(err.code(), "schedule_failed");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_conflict_maps_to_409() {
        let err = ApiError::from_scheduler(
            SchedulerError::NotStarted(Uuid::new_v4()),
            "heartbeat_failed",
        );
        assert_eq!(err.code(), "not_started");
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }
}
