//! # Event Notifier
//!
//! In-process publish/subscribe for task lifecycle events. Two surfaces:
//!
//! - a typed firehose of [`TaskEvent`] for observability and tests,
//! - per-group "task created" signals that wake long-polling dequeue
//!   handlers without a store round-trip.
//!
//! The notifier is passed into the Scheduler at construction; there is no
//! module-level registry, so tests attach their own listeners without
//! cross-test leakage. Signals are local to one server process — waiters on
//! other instances fall back to their poll ceiling.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{Task, TaskState};

/// A task lifecycle event; `kind` is the state the task just entered
#[derive(Debug, Clone)]
pub struct TaskEvent {
    pub kind: TaskState,
    pub task: Task,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

/// Typed lifecycle event dispatch
#[derive(Debug, Clone)]
pub struct EventNotifier {
    sender: broadcast::Sender<TaskEvent>,
    group_signals: Arc<DashMap<String, broadcast::Sender<Uuid>>>,
    signal_capacity: usize,
}

impl EventNotifier {
    /// Create a notifier with the given firehose capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            group_signals: Arc::new(DashMap::new()),
            signal_capacity: capacity,
        }
    }

    /// Publish a lifecycle event
    ///
    /// Having no subscribers is fine. A CREATED event additionally pings the
    /// group's long-poll waiters.
    pub fn notify(&self, kind: TaskState, task: &Task) {
        let event = TaskEvent {
            kind,
            task: task.clone(),
            occurred_at: chrono::Utc::now(),
        };
        // send() errs only when nobody is listening, which is acceptable
        let _ = self.sender.send(event);

        if kind == TaskState::Created {
            self.signal_created(&task.group_key, task.id);
        }
    }

    /// Subscribe to the full event firehose
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.sender.subscribe()
    }

    /// Watch for "task created" signals on one group key
    ///
    /// Dropping the receiver is the unsubscribe; a later publish that finds
    /// no listeners reclaims the group's entry.
    pub fn watch_group(&self, group_key: &str) -> broadcast::Receiver<Uuid> {
        self.group_signals
            .entry(group_key.to_string())
            .or_insert_with(|| broadcast::channel(self.signal_capacity).0)
            .subscribe()
    }

    /// Number of firehose subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Number of group keys currently holding a signal channel
    pub fn watched_group_count(&self) -> usize {
        self.group_signals.len()
    }

    fn signal_created(&self, group_key: &str, id: Uuid) {
        if let Some(entry) = self.group_signals.get(group_key) {
            if entry.send(id).is_ok() {
                return;
            }
            // all waiters are gone; release the guard before removing
            drop(entry);
            self.group_signals
                .remove_if(group_key, |_, sender| sender.receiver_count() == 0);
        }
    }
}

impl Default for EventNotifier {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn sample_task(group_key: &str, state: TaskState) -> Task {
        Task {
            id: Uuid::new_v4(),
            name: "t".into(),
            group_key: group_key.into(),
            group_max_concurrency: 0,
            owner_key: None,
            payload: json!({}),
            state,
            retry_count: 0,
            retry_max: 0,
            created_to_started_timeout_secs: 30,
            started_to_completed_timeout_secs: 60,
            heartbeat_timeout_secs: 30,
            created_at: Utc::now(),
            started_at: None,
            last_heartbeat_at: None,
            terminated_at: None,
            output: None,
            error: None,
            version: 1,
        }
    }

    #[tokio::test]
    async fn test_firehose_delivers_typed_events() {
        let notifier = EventNotifier::default();
        let mut rx = notifier.subscribe();

        let task = sample_task("A", TaskState::Created);
        notifier.notify(TaskState::Created, &task);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, TaskState::Created);
        assert_eq!(event.task.id, task.id);
    }

    #[tokio::test]
    async fn test_notify_without_subscribers_is_fine() {
        let notifier = EventNotifier::default();
        let task = sample_task("A", TaskState::Succeeded);
        notifier.notify(TaskState::Succeeded, &task);
    }

    #[tokio::test]
    async fn test_group_signal_fires_for_matching_group_only() {
        let notifier = EventNotifier::default();
        let mut watch_a = notifier.watch_group("A");
        let mut watch_b = notifier.watch_group("B");

        let task = sample_task("A", TaskState::Created);
        notifier.notify(TaskState::Created, &task);

        assert_eq!(watch_a.try_recv().unwrap(), task.id);
        assert!(watch_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_only_created_pings_group_watchers() {
        let notifier = EventNotifier::default();
        let mut watch = notifier.watch_group("A");

        let task = sample_task("A", TaskState::Started);
        notifier.notify(TaskState::Started, &task);

        assert!(watch.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stale_group_entry_reclaimed_on_publish() {
        let notifier = EventNotifier::default();
        let watch = notifier.watch_group("A");
        assert_eq!(notifier.watched_group_count(), 1);
        drop(watch);

        let task = sample_task("A", TaskState::Created);
        notifier.notify(TaskState::Created, &task);
        assert_eq!(notifier.watched_group_count(), 0);
    }
}
