//! # Error Types
//!
//! Central error type for the scheduling core. Every public operation on the
//! Scheduler and the Task Store returns [`Result`]; contention (a lost claim
//! race, a concurrent terminal transition) is never an error and shows up as
//! zero affected rows instead.

use thiserror::Error;
use uuid::Uuid;

/// Result alias used throughout the scheduling core
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Errors surfaced by the Scheduler and the Task Store
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Underlying database failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Structurally invalid request (bad timeouts, malformed args)
    #[error("validation error: {0}")]
    Validation(String),

    /// No task row exists for the given id
    #[error("task {0} not found")]
    TaskNotFound(Uuid),

    /// The requested transition is not an edge of the state graph
    #[error("task {task_id} is {state}, cannot transition to {target}")]
    InvalidTransition {
        task_id: Uuid,
        state: String,
        target: String,
    },

    /// Heartbeat addressed to a task that is not currently STARTED
    #[error("task {0} is not started")]
    NotStarted(Uuid),

    /// Configuration loading or validation failure
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SchedulerError {
    /// Stable machine-readable code, used verbatim in the HTTP error envelope
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "internal_error",
            Self::Validation(_) => "validation_failed",
            Self::TaskNotFound(_) => "task_not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::NotStarted(_) => "not_started",
            Self::Configuration(_) => "configuration_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        let id = Uuid::new_v4();
        assert_eq!(SchedulerError::TaskNotFound(id).code(), "task_not_found");
        assert_eq!(SchedulerError::NotStarted(id).code(), "not_started");
        assert_eq!(
            SchedulerError::Validation("x".into()).code(),
            "validation_failed"
        );
        assert_eq!(
            SchedulerError::InvalidTransition {
                task_id: id,
                state: "SUCCEEDED".into(),
                target: "CANCELLED".into(),
            }
            .code(),
            "invalid_transition"
        );
    }

    #[test]
    fn test_invalid_transition_message() {
        let id = Uuid::new_v4();
        let err = SchedulerError::InvalidTransition {
            task_id: id,
            state: "SUCCEEDED".into(),
            target: "CANCELLED".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("SUCCEEDED"));
        assert!(msg.contains("CANCELLED"));
    }
}
