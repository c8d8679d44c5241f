//! # Task Endpoint Handlers
//!
//! HTTP handlers for the task lifecycle: admission (`schedule`/`immediate`),
//! claiming (`dequeue`, with optional long-polling), completion reporting,
//! heartbeats, cancellation, search and output retrieval.
//!
//! Every handler is a thin shell over the [`Scheduler`](crate::scheduler::Scheduler);
//! the wire shapes here are the only place request JSON is interpreted.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::models::{NewTask, SearchCursor, Task, TaskFilter, TaskState};
use crate::web::error::{ApiError, ApiResult};
use crate::web::extract::{ApiJson, ApiPath};
use crate::web::state::AppState;

/// Retry budget carried on a scheduling request
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrySpec {
    pub count: i32,
    pub max: i32,
}

/// Per-task timeout budgets, in seconds
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutSpec {
    pub created_to_started: i32,
    pub started_to_completed: i32,
    pub heartbeat: i32,
}

/// Body of `POST /v1/schedule` and `POST /v1/immediate`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub name: String,
    pub group_key: String,
    #[serde(default)]
    pub group_max_concurrency: i32,
    #[serde(default)]
    pub owner_key: Option<String>,
    pub retry: RetrySpec,
    pub timeout_settings_in_secs: TimeoutSpec,
    pub args: Value,
}

impl From<ScheduleRequest> for NewTask {
    fn from(request: ScheduleRequest) -> Self {
        NewTask {
            name: request.name,
            group_key: request.group_key,
            group_max_concurrency: request.group_max_concurrency,
            owner_key: request.owner_key,
            payload: request.args,
            retry_count: request.retry.count,
            retry_max: request.retry.max,
            created_to_started_timeout_secs: request.timeout_settings_in_secs.created_to_started,
            started_to_completed_timeout_secs: request
                .timeout_settings_in_secs
                .started_to_completed,
            heartbeat_timeout_secs: request.timeout_settings_in_secs.heartbeat,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResponse {
    pub task_id: Uuid,
}

/// Schedule a task: POST /v1/schedule
pub async fn schedule(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ScheduleRequest>,
) -> ApiResult<Json<ScheduleResponse>> {
    let task = state
        .scheduler
        .schedule(request.into())
        .await
        .map_err(|e| ApiError::from_scheduler(e, "schedule_failed"))?;
    Ok(Json(ScheduleResponse { task_id: task.id }))
}

/// Schedule a task for immediate execution: POST /v1/immediate
pub async fn immediate(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ScheduleRequest>,
) -> ApiResult<Json<ScheduleResponse>> {
    let task = state
        .scheduler
        .immediate(request.into())
        .await
        .map_err(|e| ApiError::from_scheduler(e, "immediate_failed"))?;
    Ok(Json(ScheduleResponse { task_id: task.id }))
}

/// Body of `POST /v1/dequeue`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DequeueRequest {
    pub group_key: String,
    pub limit: i64,
    #[serde(default)]
    pub long_polling: bool,
    #[serde(default)]
    pub owner_key: Option<String>,
    /// Claim without admission control (no group cap, no owner exclusivity)
    #[serde(default)]
    pub flag_dequeue_legacy: bool,
}

/// Claim tasks for a group: POST /v1/dequeue
///
/// With `longPolling`, an empty claim holds the response open until either a
/// CREATED event lands for the group (then the claim is retried) or the
/// server-side ceiling elapses (then an empty list is returned, not an error).
pub async fn dequeue(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<DequeueRequest>,
) -> ApiResult<Json<Vec<Task>>> {
    let claimed = try_claim(&state, &request).await?;
    if !claimed.is_empty() || !request.long_polling {
        return Ok(Json(claimed));
    }

    // Subscribe, then claim once more: a task created between the first
    // attempt and the subscription would otherwise sleep out the ceiling.
    let mut created = state.scheduler.notifier().watch_group(&request.group_key);
    let claimed = try_claim(&state, &request).await?;
    if !claimed.is_empty() {
        return Ok(Json(claimed));
    }

    let deadline = Instant::now() + Duration::from_millis(state.config.long_poll_ceiling_ms);
    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {
                debug!(group_key = %request.group_key, "long-poll ceiling reached, responding empty");
                return Ok(Json(Vec::new()));
            }
            signal = created.recv() => match signal {
                // A lagged receiver missed signals, which is reason enough to retry
                Ok(_) | Err(RecvError::Lagged(_)) => {
                    let claimed = try_claim(&state, &request).await?;
                    if !claimed.is_empty() {
                        return Ok(Json(claimed));
                    }
                }
                Err(RecvError::Closed) => return Ok(Json(Vec::new())),
            }
        }
    }
}

async fn try_claim(state: &AppState, request: &DequeueRequest) -> ApiResult<Vec<Task>> {
    let result = if request.flag_dequeue_legacy {
        state
            .scheduler
            .dequeue_legacy(&request.group_key, request.limit)
            .await
    } else {
        state
            .scheduler
            .dequeue(
                &request.group_key,
                request.limit,
                request.owner_key.as_deref(),
            )
            .await
    };
    result.map_err(|e| ApiError::from_scheduler(e, "dequeue_failed"))
}

/// Report a task outcome: PUT /v1/tasks/{taskId}
///
/// The body carries exactly one of `output` (success) or `error` (failure);
/// which field is present selects the transition. A failure with retry budget
/// left re-enters CREATED instead of terminating.
pub async fn put_task_result(
    State(state): State<AppState>,
    ApiPath(task_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<Json<Task>> {
    let fields = body
        .as_object()
        .ok_or_else(|| ApiError::bad_request("body must be a JSON object"))?;

    let task = match (fields.get("output"), fields.get("error")) {
        (Some(output), None) => state.scheduler.succeed(task_id, output.clone()).await,
        (None, Some(error)) => state.scheduler.fail(task_id, error.clone()).await,
        _ => {
            return Err(ApiError::bad_request(
                "body must carry exactly one of output or error",
            ))
        }
    }
    .map_err(ApiError::from)?;

    Ok(Json(task))
}

/// Record a liveness heartbeat: POST /v1/tasks/{taskId}/heartbeat
pub async fn heartbeat_task(
    State(state): State<AppState>,
    ApiPath(task_id): ApiPath<Uuid>,
) -> ApiResult<Json<Task>> {
    let task = state
        .scheduler
        .heartbeat(task_id)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(task))
}

/// Optional body of `DELETE /v1/tasks/{taskId}`
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Cancel a task: DELETE /v1/tasks/{taskId}
///
/// Only CREATED and STARTED tasks can be cancelled; a second cancel (or a
/// cancel racing a completion) reports `invalid_transition`.
pub async fn cancel_task(
    State(state): State<AppState>,
    ApiPath(task_id): ApiPath<Uuid>,
    body: Option<ApiJson<CancelRequest>>,
) -> ApiResult<Json<Task>> {
    let reason = body.and_then(|ApiJson(request)| request.reason).map(Value::from);
    let task = state
        .scheduler
        .cancel(task_id, reason)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(task))
}

/// Body of `POST /v1/tasks/search`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchRequest {
    pub ids: Option<Vec<Uuid>>,
    pub group_key: Option<String>,
    pub states: Option<Vec<TaskState>>,
    pub owner_key: Option<String>,
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub tasks: Vec<Task>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Read-only task search: POST /v1/tasks/search
///
/// Keyset-paginated: `nextCursor` is present whenever the page came back
/// full, and feeds the follow-up request verbatim.
pub async fn search_tasks(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SearchRequest>,
) -> ApiResult<Json<SearchResponse>> {
    let cursor = request
        .cursor
        .as_deref()
        .map(str::parse::<SearchCursor>)
        .transpose()
        .map_err(ApiError::bad_request)?;

    let filter = TaskFilter {
        ids: request.ids,
        group_key: request.group_key,
        states: request.states,
        owner_key: request.owner_key,
        cursor,
        limit: request.limit.unwrap_or_else(|| TaskFilter::default().limit),
    };

    let tasks = state
        .scheduler
        .search(&filter)
        .await
        .map_err(|e| ApiError::from_scheduler(e, "search_failed"))?;

    let next_cursor = if tasks.len() as i64 == filter.limit {
        tasks.last().map(|t| SearchCursor::after(t).to_string())
    } else {
        None
    };

    Ok(Json(SearchResponse { tasks, next_cursor }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutputResponse {
    pub state: TaskState,
    pub output: Option<Value>,
    pub error: Option<Value>,
}

/// Fetch a task's state and terminal payloads: GET /v1/task/{taskId}/output
///
/// Non-terminal tasks answer with their current state and both payloads
/// null; callers poll until the state turns terminal.
pub async fn get_task_output(
    State(state): State<AppState>,
    ApiPath(task_id): ApiPath<Uuid>,
) -> ApiResult<Json<OutputResponse>> {
    let task = state
        .scheduler
        .get_task(task_id)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(OutputResponse {
        state: task.state,
        output: task.output,
        error: task.error,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schedule_request_wire_shape() {
        let body = json!({
            "name": "action:sync",
            "groupKey": "sync:github",
            "retry": { "count": 0, "max": 2 },
            "timeoutSettingsInSecs": {
                "createdToStarted": 30,
                "startedToCompleted": 300,
                "heartbeat": 60
            },
            "args": {
                "type": "action",
                "actionName": "refresh",
                "activityLogId": "log-7",
                "input": {},
                "connection": {
                    "id": 1,
                    "connection_id": "conn-1",
                    "provider_config_key": "github",
                    "environment_id": 1
                }
            }
        });

        let request: ScheduleRequest = serde_json::from_value(body).unwrap();
        assert_eq!(request.group_key, "sync:github");
        assert_eq!(request.group_max_concurrency, 0);
        assert!(request.owner_key.is_none());

        let new_task = NewTask::from(request);
        assert_eq!(new_task.retry_max, 2);
        assert_eq!(new_task.heartbeat_timeout_secs, 60);
        assert_eq!(new_task.payload["type"], "action");
    }

    #[test]
    fn test_dequeue_request_defaults() {
        let request: DequeueRequest =
            serde_json::from_value(json!({ "groupKey": "action", "limit": 5 })).unwrap();
        assert!(!request.long_polling);
        assert!(!request.flag_dequeue_legacy);
        assert!(request.owner_key.is_none());
    }

    #[test]
    fn test_search_response_omits_exhausted_cursor() {
        let response = SearchResponse {
            tasks: Vec::new(),
            next_cursor: None,
        };
        let encoded = serde_json::to_value(&response).unwrap();
        assert!(encoded.get("nextCursor").is_none());
    }
}
