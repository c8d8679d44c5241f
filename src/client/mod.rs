//! # Orchestrator API Client
//!
//! HTTP client for the orchestrator web API. Covers every endpoint: task
//! admission, dequeue (including long-polling), completion reporting,
//! heartbeats, cancellation, search and output retrieval, plus the blocking
//! [`execute`](OrchestratorClient::execute) convenience built on top of them.
//!
//! Retries are automatic for server errors and network failures with
//! exponential backoff; client errors (4xx) are returned immediately with the
//! server's error code.

pub mod error;

pub use error::{ClientError, ClientResult};

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::models::{Task, TaskState};
use crate::web::handlers::tasks::{
    CancelRequest, DequeueRequest, OutputResponse, ScheduleRequest, ScheduleResponse,
    SearchRequest, SearchResponse,
};

/// HTTP client for the orchestrator API
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Clone)]
pub struct OrchestratorClient {
    client: Client,
    config: ClientConfig,
    base_url: Url,
}

impl std::fmt::Debug for OrchestratorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorClient")
            .field("base_url", &self.base_url.as_str())
            .field("timeout_ms", &self.config.request_timeout_ms)
            .field("max_retries", &self.config.max_retries)
            .finish()
    }
}

impl OrchestratorClient {
    /// Create a client from configuration
    ///
    /// Validates the base URL and builds the underlying HTTP client with the
    /// configured request timeout.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ClientError::Configuration(format!("invalid base URL: {e}")))?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(concat!("orchestra-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Configuration(format!("failed to build HTTP client: {e}")))?;

        info!(
            base_url = %config.base_url,
            timeout_ms = config.request_timeout_ms,
            max_retries = config.max_retries,
            "created orchestrator client"
        );

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Schedule a task; returns its id
    ///
    /// POST /v1/schedule
    pub async fn schedule(&self, request: &ScheduleRequest) -> ClientResult<Uuid> {
        debug!(name = %request.name, group_key = %request.group_key, "scheduling task");
        let url = self.url("v1/schedule")?;
        let response: ScheduleResponse = self
            .send_with_retry("schedule", || self.client.post(url.clone()).json(request))
            .await?;
        Ok(response.task_id)
    }

    /// Schedule a task for immediate execution; returns its id
    ///
    /// POST /v1/immediate
    pub async fn immediate(&self, request: &ScheduleRequest) -> ClientResult<Uuid> {
        debug!(name = %request.name, group_key = %request.group_key, "scheduling immediate task");
        let url = self.url("v1/immediate")?;
        let response: ScheduleResponse = self
            .send_with_retry("immediate", || self.client.post(url.clone()).json(request))
            .await?;
        Ok(response.task_id)
    }

    /// Claim tasks for a group
    ///
    /// POST /v1/dequeue
    ///
    /// With `longPolling` set the call blocks server-side up to the poll
    /// ceiling; an empty vec is a normal answer, not an error.
    pub async fn dequeue(&self, request: &DequeueRequest) -> ClientResult<Vec<Task>> {
        let url = self.url("v1/dequeue")?;
        self.send_with_retry("dequeue", || self.client.post(url.clone()).json(request))
            .await
    }

    /// Record a liveness heartbeat for a running task
    ///
    /// POST /v1/tasks/{taskId}/heartbeat
    pub async fn heartbeat(&self, task_id: Uuid) -> ClientResult<Task> {
        let url = self.url(&format!("v1/tasks/{task_id}/heartbeat"))?;
        self.send_with_retry("heartbeat", || self.client.post(url.clone()))
            .await
    }

    /// Report success with an output payload
    ///
    /// PUT /v1/tasks/{taskId} with `{ output }`
    pub async fn succeed(&self, task_id: Uuid, output: Value) -> ClientResult<Task> {
        let url = self.url(&format!("v1/tasks/{task_id}"))?;
        let body = serde_json::json!({ "output": output });
        self.send_with_retry("succeed", || self.client.put(url.clone()).json(&body))
            .await
    }

    /// Report failure with an error payload
    ///
    /// PUT /v1/tasks/{taskId} with `{ error }`; the scheduler decides whether
    /// this retries (back to CREATED) or terminates (FAILED).
    pub async fn fail(&self, task_id: Uuid, error: Value) -> ClientResult<Task> {
        let url = self.url(&format!("v1/tasks/{task_id}"))?;
        let body = serde_json::json!({ "error": error });
        self.send_with_retry("fail", || self.client.put(url.clone()).json(&body))
            .await
    }

    /// Cancel a CREATED or STARTED task
    ///
    /// DELETE /v1/tasks/{taskId}
    pub async fn cancel(&self, task_id: Uuid, reason: Option<String>) -> ClientResult<Task> {
        let url = self.url(&format!("v1/tasks/{task_id}"))?;
        let body = CancelRequest { reason };
        self.send_with_retry("cancel", || self.client.delete(url.clone()).json(&body))
            .await
    }

    /// Read-only task search
    ///
    /// POST /v1/tasks/search
    pub async fn search(&self, request: &SearchRequest) -> ClientResult<SearchResponse> {
        let url = self.url("v1/tasks/search")?;
        self.send_with_retry("search", || self.client.post(url.clone()).json(request))
            .await
    }

    /// Fetch a task's state and terminal payloads
    ///
    /// GET /v1/task/{taskId}/output
    pub async fn get_output(&self, task_id: Uuid) -> ClientResult<OutputResponse> {
        let url = self.url(&format!("v1/task/{task_id}/output"))?;
        self.send_with_retry("get_output", || self.client.get(url.clone()))
            .await
    }

    /// Schedule a task and block until it completes
    ///
    /// Polls the output endpoint at the configured interval until the task
    /// turns terminal or `fetch_timeout_ms` elapses. SUCCEEDED yields the
    /// output; every other terminal state (and the deadline) yields a typed
    /// error carrying the terminal payload.
    pub async fn execute(&self, request: &ScheduleRequest) -> ClientResult<Value> {
        let task_id = self.schedule(request).await?;
        debug!(task_id = %task_id, "task scheduled, waiting for completion");
        self.wait_for_completion(task_id).await
    }

    /// Block until an already-scheduled task completes
    pub async fn wait_for_completion(&self, task_id: Uuid) -> ClientResult<Value> {
        let deadline = Instant::now() + Duration::from_millis(self.config.fetch_timeout_ms);
        let interval = Duration::from_millis(self.config.output_poll_interval_ms);

        loop {
            let response = self.get_output(task_id).await?;
            match response.state {
                TaskState::Succeeded => return Ok(response.output.unwrap_or(Value::Null)),
                TaskState::Failed => {
                    return Err(ClientError::TaskFailed {
                        task_id,
                        payload: response.error,
                    })
                }
                TaskState::Expired => {
                    return Err(ClientError::TaskExpired {
                        task_id,
                        payload: response.error,
                    })
                }
                TaskState::Cancelled => {
                    return Err(ClientError::TaskCancelled {
                        task_id,
                        payload: response.error,
                    })
                }
                TaskState::Created | TaskState::Started => {}
            }

            if Instant::now() >= deadline {
                warn!(task_id = %task_id, timeout_ms = self.config.fetch_timeout_ms, "gave up waiting for task completion");
                return Err(ClientError::ExecuteTimeout {
                    task_id,
                    timeout_ms: self.config.fetch_timeout_ms,
                });
            }
            tokio::time::sleep(interval).await;
        }
    }

    fn url(&self, path: &str) -> ClientResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::Configuration(format!("failed to construct URL for {path}: {e}")))
    }

    /// Exponential backoff before the next retry: 2s, 4s, ... capped at 64s
    fn backoff_delay(retries: u32) -> Duration {
        Duration::from_secs(1u64 << retries.min(6))
    }

    /// Send a request, retrying server errors and network failures
    ///
    /// Client errors (4xx) return immediately with the server's error code.
    /// Backoff is exponential with a 64s ceiling.
    async fn send_with_retry<T, F>(&self, operation: &'static str, build: F) -> ClientResult<T>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut retries = 0;
        loop {
            match build().send().await {
                Ok(response) if response.status().is_success() => {
                    return response.json::<T>().await.map_err(|e| {
                        error!(operation, error = %e, "failed to parse response body");
                        ClientError::Transport(e)
                    });
                }
                Ok(response) => {
                    let status = response.status();
                    let (code, message) = Self::error_envelope(response).await;

                    if status.is_client_error() {
                        debug!(operation, %status, %code, "client error, not retrying");
                        return Err(ClientError::Api {
                            status,
                            code,
                            message,
                        });
                    }

                    warn!(
                        operation,
                        %status,
                        %code,
                        retry = retries + 1,
                        max_retries = self.config.max_retries,
                        "server error, will retry"
                    );
                }
                Err(e) => {
                    warn!(
                        operation,
                        error = %e,
                        retry = retries + 1,
                        max_retries = self.config.max_retries,
                        "network error, will retry"
                    );
                }
            }

            retries += 1;
            if retries >= self.config.max_retries {
                error!(operation, retries, "exhausted retries");
                return Err(ClientError::RetriesExhausted { operation, retries });
            }

            tokio::time::sleep(Self::backoff_delay(retries)).await;
        }
    }

    /// Pull `{ "error": { "code", "message" } }` out of a failure response
    async fn error_envelope(response: reqwest::Response) -> (String, String) {
        match response.json::<Value>().await {
            Ok(body) => {
                let code = body["error"]["code"].as_str().unwrap_or("http_error");
                let message = body["error"]["message"].as_str().unwrap_or("unknown error");
                (code.to_string(), message.to_string())
            }
            Err(_) => ("http_error".to_string(), "unknown error".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_malformed_base_url() {
        let config = ClientConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        let err = OrchestratorClient::new(config).unwrap_err();
        assert_eq!(err.code(), "configuration_error");
    }

    #[test]
    fn test_backoff_grows_then_caps() {
        assert_eq!(OrchestratorClient::backoff_delay(1), Duration::from_secs(2));
        assert_eq!(OrchestratorClient::backoff_delay(5), Duration::from_secs(32));
        assert_eq!(OrchestratorClient::backoff_delay(6), Duration::from_secs(64));
        // large retry budgets must not overflow the shift
        assert_eq!(OrchestratorClient::backoff_delay(64), Duration::from_secs(64));
        assert_eq!(OrchestratorClient::backoff_delay(u32::MAX), Duration::from_secs(64));
    }

    #[test]
    fn test_url_construction() {
        let client = OrchestratorClient::new(ClientConfig::default()).unwrap();
        let url = client.url("v1/schedule").unwrap();
        assert_eq!(url.as_str(), "http://localhost:3008/v1/schedule");

        let id = Uuid::new_v4();
        let url = client.url(&format!("v1/tasks/{id}/heartbeat")).unwrap();
        assert!(url.path().ends_with("/heartbeat"));
    }
}
