//! # Scheduler
//!
//! Owner of the task state machine. Every mutation of a task flows through
//! here: admission (`schedule`/`immediate`), atomic claim (`dequeue`),
//! liveness (`heartbeat` and the expiry sweeper), and outcome reporting
//! (`succeed`/`fail`/`cancel`). Each successful transition fires a typed
//! event on the injected [`EventNotifier`].
//!
//! Contention is not an error: a claim that loses its race returns fewer
//! rows, a terminal transition that loses returns an invalid-transition
//! error naming the state the winner left behind.

pub mod sweeper;

pub use sweeper::ExpirySweeper;

use sqlx::PgPool;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{Result, SchedulerError};
use crate::events::EventNotifier;
use crate::models::{NewTask, Task, TaskArgs, TaskFilter, TaskState};

/// Largest claim batch a single dequeue call may request
pub const MAX_DEQUEUE_LIMIT: i64 = 100;

/// Task state machine operations over the shared store
#[derive(Debug, Clone)]
pub struct Scheduler {
    pool: PgPool,
    notifier: EventNotifier,
}

impl Scheduler {
    /// Create a scheduler over a pool, dispatching events to `notifier`
    pub fn new(pool: PgPool, notifier: EventNotifier) -> Self {
        Self { pool, notifier }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn notifier(&self) -> &EventNotifier {
        &self.notifier
    }

    /// Validate and insert a CREATED task; fires CREATED
    #[instrument(skip(self, new_task), fields(name = %new_task.name, group_key = %new_task.group_key))]
    pub async fn schedule(&self, new_task: NewTask) -> Result<Task> {
        new_task.validate()?;
        TaskArgs::from_payload(&new_task.payload)?;

        let task = Task::create(&self.pool, new_task).await?;
        info!(
            task_id = %task.id,
            group_key = %task.group_key,
            name = %task.name,
            "task scheduled"
        );
        self.notifier.notify(TaskState::Created, &task);
        Ok(task)
    }

    /// Alias of [`schedule`](Self::schedule): the task is eligible for
    /// dequeue right away (this core has no future scheduling window)
    pub async fn immediate(&self, new_task: NewTask) -> Result<Task> {
        self.schedule(new_task).await
    }

    /// Claim up to `limit` eligible tasks of a group; fires STARTED per claim
    ///
    /// FIFO by creation time, owner-exclusive, group-cap aware. Returns
    /// fewer tasks than `limit` (possibly none) when the queue is short, the
    /// cap is reached, or a concurrent claimer got there first.
    #[instrument(skip(self), fields(group_key = %group_key, limit))]
    pub async fn dequeue(
        &self,
        group_key: &str,
        limit: i64,
        owner_key: Option<&str>,
    ) -> Result<Vec<Task>> {
        self.validate_dequeue(group_key, limit)?;

        let tasks = Task::claim_batch(&self.pool, group_key, limit, owner_key).await?;
        self.after_claim(group_key, &tasks);
        Ok(tasks)
    }

    /// The pre-admission-control claim path, kept for callers still sending
    /// `flagDequeueLegacy`: plain FIFO with no group cap or owner exclusivity
    #[instrument(skip(self), fields(group_key = %group_key, limit))]
    pub async fn dequeue_legacy(&self, group_key: &str, limit: i64) -> Result<Vec<Task>> {
        self.validate_dequeue(group_key, limit)?;

        let tasks = Task::claim_batch_legacy(&self.pool, group_key, limit).await?;
        self.after_claim(group_key, &tasks);
        Ok(tasks)
    }

    fn validate_dequeue(&self, group_key: &str, limit: i64) -> Result<()> {
        if group_key.is_empty() {
            return Err(SchedulerError::Validation(
                "groupKey must not be empty".into(),
            ));
        }
        if limit <= 0 || limit > MAX_DEQUEUE_LIMIT {
            return Err(SchedulerError::Validation(format!(
                "limit must be between 1 and {MAX_DEQUEUE_LIMIT}"
            )));
        }
        Ok(())
    }

    fn after_claim(&self, group_key: &str, tasks: &[Task]) {
        if tasks.is_empty() {
            debug!(group_key = %group_key, "dequeue claimed nothing");
            return;
        }
        debug!(group_key = %group_key, claimed = tasks.len(), "dequeue claimed tasks");
        for task in tasks {
            self.notifier.notify(TaskState::Started, task);
        }
    }

    /// Refresh a STARTED task's heartbeat
    pub async fn heartbeat(&self, task_id: Uuid) -> Result<Task> {
        match Task::record_heartbeat(&self.pool, task_id).await? {
            Some(task) => Ok(task),
            None => match Task::find_by_id(&self.pool, task_id).await? {
                Some(_) => Err(SchedulerError::NotStarted(task_id)),
                None => Err(SchedulerError::TaskNotFound(task_id)),
            },
        }
    }

    /// STARTED → SUCCEEDED with the handler's output; fires SUCCEEDED
    #[instrument(skip(self, output), fields(task_id = %task_id))]
    pub async fn succeed(&self, task_id: Uuid, output: serde_json::Value) -> Result<Task> {
        match Task::transition_terminal(&self.pool, task_id, TaskState::Succeeded, Some(&output))
            .await?
        {
            Some(task) => {
                info!(task_id = %task.id, group_key = %task.group_key, "task succeeded");
                self.notifier.notify(TaskState::Succeeded, &task);
                Ok(task)
            }
            None => Err(self.transition_conflict(task_id, TaskState::Succeeded).await),
        }
    }

    /// Report a failed attempt
    ///
    /// With retry budget left the task reopens as CREATED (`retry_count + 1`,
    /// same id) and fires CREATED so long-pollers wake for the next attempt;
    /// the attempt's error is logged but only stored once retries are
    /// exhausted and the task lands in terminal FAILED.
    #[instrument(skip(self, error), fields(task_id = %task_id))]
    pub async fn fail(&self, task_id: Uuid, error: serde_json::Value) -> Result<Task> {
        if let Some(task) = Task::reopen_for_retry(&self.pool, task_id).await? {
            warn!(
                task_id = %task.id,
                group_key = %task.group_key,
                retry_count = task.retry_count,
                retry_max = task.retry_max,
                error = %error,
                "task attempt failed, retrying"
            );
            self.notifier.notify(TaskState::Created, &task);
            return Ok(task);
        }

        match Task::transition_terminal(&self.pool, task_id, TaskState::Failed, Some(&error))
            .await?
        {
            Some(task) => {
                warn!(
                    task_id = %task.id,
                    group_key = %task.group_key,
                    retry_count = task.retry_count,
                    "task failed, retries exhausted"
                );
                self.notifier.notify(TaskState::Failed, &task);
                Ok(task)
            }
            None => Err(self.transition_conflict(task_id, TaskState::Failed).await),
        }
    }

    /// CREATED/STARTED → CANCELLED; fires CANCELLED
    ///
    /// Cooperative: a running handler is not interrupted here, its Processor
    /// learns about the state change from its terminal watcher.
    #[instrument(skip(self, reason), fields(task_id = %task_id))]
    pub async fn cancel(&self, task_id: Uuid, reason: Option<serde_json::Value>) -> Result<Task> {
        let payload = serde_json::json!({
            "reason": reason.unwrap_or_else(|| "cancelled_via_api".into())
        });

        match Task::transition_terminal(&self.pool, task_id, TaskState::Cancelled, Some(&payload))
            .await?
        {
            Some(task) => {
                info!(task_id = %task.id, group_key = %task.group_key, "task cancelled");
                self.notifier.notify(TaskState::Cancelled, &task);
                Ok(task)
            }
            None => Err(self.transition_conflict(task_id, TaskState::Cancelled).await),
        }
    }

    /// Expire every task past one of its timeout budgets; fires EXPIRED each
    ///
    /// Called by the [`ExpirySweeper`] tick; exposed for tests and manual
    /// operations.
    pub async fn expire_overdue(&self, batch_size: i64) -> Result<Vec<Task>> {
        let expired = Task::expire_overdue(&self.pool, batch_size).await?;
        for task in &expired {
            warn!(
                task_id = %task.id,
                group_key = %task.group_key,
                reason = %task.error.as_ref().and_then(|e| e["reason"].as_str()).unwrap_or("unknown"),
                "task expired"
            );
            self.notifier.notify(TaskState::Expired, task);
        }
        Ok(expired)
    }

    /// Read-only task search
    pub async fn search(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        if filter.limit <= 0 {
            return Err(SchedulerError::Validation("limit must be positive".into()));
        }
        Ok(Task::search(&self.pool, filter).await?)
    }

    /// Fetch one task, erroring when it does not exist
    pub async fn get_task(&self, task_id: Uuid) -> Result<Task> {
        Task::find_by_id(&self.pool, task_id)
            .await?
            .ok_or(SchedulerError::TaskNotFound(task_id))
    }

    /// Name the precise conflict behind a zero-row terminal transition
    async fn transition_conflict(&self, task_id: Uuid, target: TaskState) -> SchedulerError {
        match Task::find_by_id(&self.pool, task_id).await {
            Ok(Some(task)) => SchedulerError::InvalidTransition {
                task_id,
                state: task.state.to_string(),
                target: target.to_string(),
            },
            Ok(None) => SchedulerError::TaskNotFound(task_id),
            Err(e) => e.into(),
        }
    }
}
