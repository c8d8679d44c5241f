//! # Web API Route Definitions
//!
//! HTTP route structure for the orchestrator API. Task lifecycle routes are
//! versioned under `/v1`; health probes live at the root.

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::web::handlers;
use crate::web::state::AppState;

/// Create API v1 routes
///
/// - Admission: `POST /v1/schedule`, `POST /v1/immediate`
/// - Claiming: `POST /v1/dequeue`
/// - Lifecycle: `PUT /v1/tasks/{taskId}`, heartbeat, cancel
/// - Reads: `POST /v1/tasks/search`, `GET /v1/task/{taskId}/output`
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/schedule", post(handlers::tasks::schedule))
        .route("/immediate", post(handlers::tasks::immediate))
        .route("/dequeue", post(handlers::tasks::dequeue))
        .route("/tasks/search", post(handlers::tasks::search_tasks))
        .route("/tasks/{taskId}", put(handlers::tasks::put_task_result))
        .route("/tasks/{taskId}", delete(handlers::tasks::cancel_task))
        .route(
            "/tasks/{taskId}/heartbeat",
            post(handlers::tasks::heartbeat_task),
        )
        .route("/task/{taskId}/output", get(handlers::tasks::get_task_output))
}

/// Create health routes
///
/// - `/health` - basic process health
/// - `/health/ready` - readiness probe including a task store round-trip
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::basic_health))
        .route("/health/ready", get(handlers::health::readiness_probe))
}
