//! # Health Check Handlers
//!
//! Kubernetes-compatible health endpoints for monitoring and load balancing.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::web::error::{ApiError, ApiResult};
use crate::web::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

/// Basic health check: GET /health
///
/// Answers as long as the process serves requests, database or not.
pub async fn basic_health(State(_state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Readiness probe: GET /health/ready
///
/// Ready means the task store answers a round-trip query.
pub async fn readiness_probe(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    debug!("performing readiness probe");

    match sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(state.scheduler.pool())
        .await
    {
        Ok(_) => Ok(Json(HealthResponse {
            status: "ready".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        })),
        Err(e) => {
            warn!(error = %e, "readiness probe failed, task store unreachable");
            Err(ApiError::service_unavailable("task store unreachable"))
        }
    }
}
