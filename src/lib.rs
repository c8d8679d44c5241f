#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Orchestra Core
//!
//! Durable task-queue scheduling and execution core on PostgreSQL.
//!
//! ## Overview
//!
//! Orchestra Core turns a Postgres table into a task queue with per-group
//! concurrency admission, owner exclusivity, retries and timeout-driven
//! expiry. Producers admit work through a [`Scheduler`](scheduler::Scheduler)
//! (embedded or behind the bundled HTTP server); worker fleets claim it with
//! atomic skip-locked dequeues and report outcomes back. Every lifecycle
//! transition is a single conditional update, so any number of servers and
//! workers can share one store without distributed locks.
//!
//! ## Task Lifecycle
//!
//! ```text
//! CREATED --dequeue--> STARTED --succeed--> SUCCEEDED
//!    |                    |------fail-----> FAILED (or back to CREATED with retries left)
//!    |                    |-----cancel----> CANCELLED
//!    |                    '-----sweep-----> EXPIRED
//!    |--cancel--> CANCELLED
//!    '--sweep---> EXPIRED
//! ```
//!
//! ## Key Features
//!
//! - **Atomic group admission**: `count(STARTED) <= groupMaxConcurrency`
//!   holds at every claim, enforced inside one transaction
//! - **Owner exclusivity**: at most one STARTED task per `ownerKey`
//! - **Liveness backstop**: the expiry sweeper reclaims tasks whose worker
//!   crashed, stalled or went silent
//! - **Long-polling dequeue**: empty claims park on the in-process CREATED
//!   event stream instead of busy-polling the store
//! - **Worker toolkit**: HTTP [`client`] with typed errors and a
//!   [`processor`](processor::Processor) claim loop with graceful drain
//!
//! ## Module Organization
//!
//! - [`models`] - the task entity, its state graph and store operations
//! - [`scheduler`] - lifecycle operations and the expiry sweeper
//! - [`events`] - in-process task event notifier
//! - [`web`] - Axum HTTP surface over the scheduler
//! - [`client`] - HTTP client for the web surface
//! - [`processor`] - worker-side claim loop
//! - [`config`] - configuration management
//! - [`error`] - structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use orchestra_core::events::EventNotifier;
//! use orchestra_core::models::NewTask;
//! use orchestra_core::scheduler::Scheduler;
//! use sqlx::PgPool;
//!
//! # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
//! let scheduler = Scheduler::new(pool, EventNotifier::default());
//!
//! let task = scheduler
//!     .schedule(NewTask {
//!         name: "sync:github".to_string(),
//!         group_key: "sync".to_string(),
//!         group_max_concurrency: 4,
//!         owner_key: None,
//!         payload: serde_json::json!({
//!             "type": "action",
//!             "actionName": "refresh",
//!             "activityLogId": "log-1",
//!             "input": {},
//!             "connection": {
//!                 "id": 1,
//!                 "connection_id": "conn-1",
//!                 "provider_config_key": "github",
//!                 "environment_id": 1
//!             }
//!         }),
//!         retry_count: 0,
//!         retry_max: 2,
//!         created_to_started_timeout_secs: 30,
//!         started_to_completed_timeout_secs: 300,
//!         heartbeat_timeout_secs: 60,
//!     })
//!     .await?;
//!
//! let claimed = scheduler.dequeue("sync", 1, None).await?;
//! assert_eq!(claimed[0].id, task.id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! Store-level tests use SQLx native testing with one isolated database per
//! test:
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # All tests, including Postgres-backed suites
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod processor;
pub mod scheduler;
pub mod web;

pub use client::{ClientError, ClientResult, OrchestratorClient};
pub use config::OrchestraConfig;
pub use error::{Result, SchedulerError};
pub use events::{EventNotifier, TaskEvent};
pub use models::{NewTask, Task, TaskState};
pub use processor::{HandlerError, Processor, ProcessorConfig, TaskHandler};
pub use scheduler::{ExpirySweeper, Scheduler};
