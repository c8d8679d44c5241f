//! # Task Processor
//!
//! Worker-side claim loop. A [`Processor`] keeps up to `max_concurrency`
//! tasks of one group in flight on this worker: it long-polls `dequeue` for
//! free slots, runs the [`TaskHandler`] for each claimed task, reports the
//! outcome through the client, and heartbeats while handlers run.
//!
//! ## Failure Semantics
//!
//! - A handler error or panic is reported via `fail`; it never tears down
//!   the loop
//! - Network failures talking to the orchestrator are logged and retried on
//!   the next tick; local in-flight accounting stays correct regardless
//! - A terminal watcher polls the orchestrator for tasks terminated behind
//!   our back (cancelled, expired) and cancels their handler tokens
//! - [`stop`](Processor::stop) ceases claiming and drains in-flight handlers
//!   gracefully, cancelling them only once the drain grace elapses

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::client::OrchestratorClient;
use crate::models::Task;
use crate::web::handlers::tasks::{DequeueRequest, SearchRequest};

/// A handler failure, reported to the orchestrator as the task's error payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    pub name: String,
    pub message: String,
}

impl HandlerError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    /// A failure with the generic `handler_error` name
    pub fn message(message: impl Into<String>) -> Self {
        Self::new("handler_error", message)
    }

    fn as_payload(&self) -> Value {
        serde_json::json!({ "name": self.name, "message": self.message })
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for HandlerError {}

/// Task execution logic supplied by the embedding worker
///
/// `cancel` fires when the task is terminated externally (cancelled by a
/// caller, expired by the sweeper) or when the processor gives up waiting
/// during shutdown. Handlers are free to ignore it; the scheduler's timeouts
/// remain the enforced backstop.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(
        &self,
        task: Task,
        cancel: CancellationToken,
    ) -> std::result::Result<Value, HandlerError>;
}

/// Configuration for a processor instance
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Parallel handlers kept in flight on this worker
    pub max_concurrency: usize,
    /// Liveness reporting cadence while a handler runs
    pub heartbeat_interval_ms: u64,
    /// Cadence of the external-termination check
    pub terminal_check_interval_ms: u64,
    /// Grace given to in-flight handlers on stop before their tokens fire
    pub drain_timeout_ms: u64,
    /// Pause after a failed dequeue before the next attempt
    pub error_backoff_ms: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            heartbeat_interval_ms: 30_000,
            terminal_check_interval_ms: 1_000, // termination awareness need not be very responsive
            drain_timeout_ms: 30_000,
            error_backoff_ms: 1_000, // avoid hammering an unhealthy server
        }
    }
}

/// Worker-side claim loop for one group
#[derive(Clone)]
pub struct Processor {
    client: OrchestratorClient,
    handler: Arc<dyn TaskHandler>,
    group_key: String,
    config: ProcessorConfig,
    in_flight: Arc<DashMap<Uuid, CancellationToken>>,
    quiesce: CancellationToken,
    is_running: Arc<AtomicBool>,
}

impl fmt::Debug for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("group_key", &self.group_key)
            .field("max_concurrency", &self.config.max_concurrency)
            .field("in_flight", &self.in_flight.len())
            .field("is_running", &self.is_running())
            .finish()
    }
}

impl Processor {
    pub fn new(
        client: OrchestratorClient,
        handler: Arc<dyn TaskHandler>,
        group_key: impl Into<String>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            client,
            handler,
            group_key: group_key.into(),
            config,
            in_flight: Arc::new(DashMap::new()),
            quiesce: CancellationToken::new(),
            is_running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Tasks currently claimed by this processor and not yet reported
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Spawn the claim loop and the terminal watcher; returns their handle
    pub fn start(&self) -> JoinHandle<()> {
        self.is_running.store(true, Ordering::SeqCst);
        let processor = self.clone();
        tokio::spawn(async move {
            tokio::join!(processor.claim_loop(), processor.terminal_watch_loop());
            processor.is_running.store(false, Ordering::SeqCst);
        })
    }

    /// Stop claiming and drain in-flight handlers
    ///
    /// Handlers still running once the drain grace elapses get their cancel
    /// tokens fired; the expiry sweeper reclaims whatever they leave behind.
    pub async fn stop(&self) {
        info!(
            group_key = %self.group_key,
            in_flight = self.in_flight.len(),
            "stopping processor"
        );
        self.quiesce.cancel();

        let drain = async {
            while !self.in_flight.is_empty() {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        let grace = Duration::from_millis(self.config.drain_timeout_ms);
        if tokio::time::timeout(grace, drain).await.is_err() {
            warn!(
                group_key = %self.group_key,
                still_in_flight = self.in_flight.len(),
                "drain grace exceeded, cancelling in-flight handlers"
            );
            for entry in self.in_flight.iter() {
                entry.value().cancel();
            }
        }
    }

    async fn claim_loop(&self) {
        info!(
            group_key = %self.group_key,
            max_concurrency = self.config.max_concurrency,
            "processor started"
        );

        loop {
            if self.quiesce.is_cancelled() {
                break;
            }

            let free = self
                .config
                .max_concurrency
                .saturating_sub(self.in_flight.len());
            if free == 0 {
                // All slots busy; check again once something can have finished
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(50)) => {}
                    _ = self.quiesce.cancelled() => break,
                }
                continue;
            }

            let request = DequeueRequest {
                group_key: self.group_key.clone(),
                limit: free as i64,
                long_polling: true,
                owner_key: None,
                flag_dequeue_legacy: false,
            };

            let claimed = tokio::select! {
                result = self.client.dequeue(&request) => result,
                _ = self.quiesce.cancelled() => break,
            };

            match claimed {
                Ok(tasks) => {
                    for task in tasks {
                        self.spawn_task(task);
                    }
                }
                Err(e) => {
                    warn!(group_key = %self.group_key, error = %e, "dequeue failed, backing off");
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_millis(self.config.error_backoff_ms)) => {}
                        _ = self.quiesce.cancelled() => break,
                    }
                }
            }
        }

        info!(group_key = %self.group_key, "processor claim loop stopped");
    }

    /// Run one claimed task to completion on its own tokio task
    fn spawn_task(&self, task: Task) {
        let cancel = CancellationToken::new();
        self.in_flight.insert(task.id, cancel.clone());

        let client = self.client.clone();
        let handler = self.handler.clone();
        let in_flight = self.in_flight.clone();
        let heartbeat_interval = Duration::from_millis(self.config.heartbeat_interval_ms);

        tokio::spawn(async move {
            let task_id = task.id;
            let heartbeater =
                spawn_heartbeat(client.clone(), task_id, heartbeat_interval, cancel.clone());

            let outcome = if cancel.is_cancelled() {
                debug!(task_id = %task_id, "task terminated before processing started");
                None
            } else {
                let run = tokio::spawn({
                    let handler = handler.clone();
                    let task = task.clone();
                    let cancel = cancel.clone();
                    async move { handler.handle(task, cancel).await }
                });
                match run.await {
                    Ok(result) => Some(result),
                    Err(join_error) => {
                        error!(task_id = %task_id, error = %join_error, "handler panicked");
                        Some(Err(HandlerError::new("handler_panic", join_error.to_string())))
                    }
                }
            };

            match outcome {
                Some(Ok(output)) => {
                    if let Err(e) = client.succeed(task_id, output).await {
                        error!(task_id = %task_id, error = %e, "failed to report success");
                    }
                }
                Some(Err(failure)) => {
                    if cancel.is_cancelled() {
                        // terminated out from under us, nothing left to report
                        debug!(task_id = %task_id, "skipping failure report for terminated task");
                    } else if let Err(e) = client.fail(task_id, failure.as_payload()).await {
                        error!(task_id = %task_id, error = %e, "failed to report failure");
                    }
                }
                None => {}
            }

            cancel.cancel();
            let _ = heartbeater.await;
            in_flight.remove(&task_id);
        });
    }

    /// Cancel handler tokens for tasks the orchestrator already terminated
    async fn terminal_watch_loop(&self) {
        let interval = Duration::from_millis(self.config.terminal_check_interval_ms);

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = self.quiesce.cancelled() => break,
            }

            let ids: Vec<Uuid> = self.in_flight.iter().map(|entry| *entry.key()).collect();
            if ids.is_empty() {
                continue;
            }

            let request = SearchRequest {
                limit: Some(ids.len() as i64),
                ids: Some(ids),
                ..Default::default()
            };
            match self.client.search(&request).await {
                Ok(response) => {
                    for task in response.tasks {
                        if task.state.is_terminal() {
                            if let Some(entry) = self.in_flight.get(&task.id) {
                                debug!(
                                    task_id = %task.id,
                                    state = %task.state,
                                    "task terminated externally, cancelling local handler"
                                );
                                entry.value().cancel();
                            }
                        }
                    }
                }
                Err(e) => {
                    debug!(group_key = %self.group_key, error = %e, "terminal check failed, will retry next tick");
                }
            }
        }
    }
}

fn spawn_heartbeat(
    client: OrchestratorClient,
    task_id: Uuid,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // consume the immediate first tick, the claim itself counts as liveness
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = client.heartbeat(task_id).await {
                        warn!(task_id = %task_id, error = %e, "heartbeat failed");
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_error_payload_shape() {
        let failure = HandlerError::message("connection refused");
        let payload = failure.as_payload();
        assert_eq!(payload["name"], "handler_error");
        assert_eq!(payload["message"], "connection refused");

        let named = HandlerError::new("rate_limited", "429 from upstream");
        assert_eq!(named.as_payload()["name"], "rate_limited");
        assert_eq!(named.to_string(), "rate_limited: 429 from upstream");
    }

    #[test]
    fn test_processor_config_defaults() {
        let config = ProcessorConfig::default();
        assert_eq!(config.max_concurrency, 10);
        assert_eq!(config.terminal_check_interval_ms, 1_000);
        assert!(config.drain_timeout_ms > 0);
    }
}
