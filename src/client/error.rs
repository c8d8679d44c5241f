//! # Client Error Types
//!
//! Failures surfaced by the [`OrchestratorClient`](super::OrchestratorClient).
//! Terminal task outcomes observed by `execute` are errors here (the caller
//! asked for a successful output and did not get one) and carry the terminal
//! payload for inspection.

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by the orchestrator HTTP client
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid client configuration: {0}")]
    Configuration(String),

    /// Request never produced an HTTP response
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with an error envelope
    #[error("api error {code}: {message}")]
    Api {
        status: StatusCode,
        code: String,
        message: String,
    },

    /// Retryable failures exhausted the retry budget
    #[error("{operation} failed after {retries} retries")]
    RetriesExhausted {
        operation: &'static str,
        retries: u32,
    },

    #[error("task {task_id} failed")]
    TaskFailed {
        task_id: Uuid,
        payload: Option<Value>,
    },

    #[error("task {task_id} expired")]
    TaskExpired {
        task_id: Uuid,
        payload: Option<Value>,
    },

    #[error("task {task_id} cancelled")]
    TaskCancelled {
        task_id: Uuid,
        payload: Option<Value>,
    },

    #[error("task {task_id} did not complete within {timeout_ms}ms")]
    ExecuteTimeout { task_id: Uuid, timeout_ms: u64 },
}

impl ClientError {
    /// Stable machine-readable code; api errors reuse the server's code
    pub fn code(&self) -> &str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::Transport(_) => "transport_error",
            Self::Api { code, .. } => code,
            Self::RetriesExhausted { .. } => "retries_exhausted",
            Self::TaskFailed { .. } => "task_failed_error",
            Self::TaskExpired { .. } => "task_expired_error",
            Self::TaskCancelled { .. } => "task_cancelled_error",
            Self::ExecuteTimeout { .. } => "task_execute_timeout",
        }
    }

    /// The terminal payload attached to a failed/expired/cancelled outcome
    pub fn payload(&self) -> Option<&Value> {
        match self {
            Self::TaskFailed { payload, .. }
            | Self::TaskExpired { payload, .. }
            | Self::TaskCancelled { payload, .. } => payload.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_outcome_codes() {
        let id = Uuid::new_v4();
        let failed = ClientError::TaskFailed {
            task_id: id,
            payload: Some(serde_json::json!({"message": "boom"})),
        };
        assert_eq!(failed.code(), "task_failed_error");
        assert_eq!(failed.payload().unwrap()["message"], "boom");

        let timeout = ClientError::ExecuteTimeout {
            task_id: id,
            timeout_ms: 1_000,
        };
        assert_eq!(timeout.code(), "task_execute_timeout");
        assert!(timeout.payload().is_none());
    }

    #[test]
    fn test_api_error_keeps_server_code() {
        let err = ClientError::Api {
            status: StatusCode::NOT_FOUND,
            code: "task_not_found".to_string(),
            message: "task 123 not found".to_string(),
        };
        assert_eq!(err.code(), "task_not_found");
    }
}
