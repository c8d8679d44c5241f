//! Shared helpers for the Postgres-backed integration suites.
//!
//! Each suite compiles this module independently and uses a subset of it.
#![allow(dead_code)]

use orchestra_core::config::ServerConfig;
use orchestra_core::events::EventNotifier;
use orchestra_core::models::{NewTask, Task};
use orchestra_core::scheduler::Scheduler;
use orchestra_core::web::{self, state::AppState};
use sqlx::PgPool;
use uuid::Uuid;

pub fn scheduler(pool: PgPool) -> Scheduler {
    Scheduler::new(pool, EventNotifier::default())
}

/// Valid `action` args payload accepted by admission validation
pub fn action_args() -> serde_json::Value {
    serde_json::json!({
        "type": "action",
        "actionName": "create-issue",
        "activityLogId": "log-1",
        "input": {},
        "connection": {
            "id": 1,
            "connection_id": "conn-1",
            "provider_config_key": "github",
            "environment_id": 1
        }
    })
}

/// A well-formed task with relaxed timeouts, customizable per test
pub fn new_task(group_key: &str) -> NewTask {
    NewTask {
        name: format!("test:{group_key}"),
        group_key: group_key.to_string(),
        group_max_concurrency: 0,
        owner_key: None,
        payload: action_args(),
        retry_count: 0,
        retry_max: 0,
        created_to_started_timeout_secs: 3600,
        started_to_completed_timeout_secs: 3600,
        heartbeat_timeout_secs: 3600,
    }
}

/// Backdate a timestamp column so timeout expressions trip without sleeping
pub async fn backdate(pool: &PgPool, id: Uuid, column: &str, secs: i64) {
    let query = format!("UPDATE tasks SET {column} = now() - $2 * INTERVAL '1 second' WHERE id = $1");
    sqlx::query(&query)
        .bind(id)
        .bind(secs)
        .execute(pool)
        .await
        .expect("backdate failed");
}

pub async fn fetch(pool: &PgPool, id: Uuid) -> Task {
    Task::find_by_id(pool, id)
        .await
        .expect("fetch failed")
        .expect("task missing")
}

/// Serve the web API on an ephemeral port; returns its base URL
pub async fn spawn_server(scheduler: Scheduler, server_config: ServerConfig) -> String {
    let app = web::create_app(AppState::new(scheduler, server_config));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let addr = listener.local_addr().expect("no local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server died");
    });
    format!("http://{addr}")
}

/// A server config with a short long-poll ceiling so tests stay fast
pub fn test_server_config() -> ServerConfig {
    ServerConfig {
        bind_address: "127.0.0.1:0".to_string(),
        request_timeout_ms: 10_000,
        long_poll_ceiling_ms: 500,
    }
}
