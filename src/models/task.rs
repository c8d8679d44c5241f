//! # Task Model
//!
//! The single core entity of the scheduling system: a durable task row with
//! state-machine semantics, group-level admission metadata, retry bookkeeping
//! and per-state timeout budgets.
//!
//! ## State machine
//!
//! ```text
//! CREATED  --claim--------------------------> STARTED
//! CREATED  --cancel-------------------------> CANCELLED
//! CREATED  --sweep (createdToStarted)-------> EXPIRED
//! STARTED  --succeed------------------------> SUCCEEDED
//! STARTED  --fail (retries left)------------> CREATED  (retry_count + 1)
//! STARTED  --fail (exhausted)---------------> FAILED
//! STARTED  --cancel-------------------------> CANCELLED
//! STARTED  --sweep (running or heartbeat)---> EXPIRED
//! ```
//!
//! ## Concurrency
//!
//! Every mutation here is a single conditional statement: the `WHERE` clause
//! names the expected pre-state and the update bumps `version`. Zero affected
//! rows means a concurrent caller won the race, which is benign. The claim
//! path additionally serializes per group with an advisory transaction lock
//! so the admission count cannot be read twice concurrently, serializes per
//! candidate owner so owner exclusivity holds across groups, and locks
//! candidate rows with `FOR UPDATE SKIP LOCKED` so it never blocks behind a
//! terminator or the sweeper.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::fmt;
use uuid::Uuid;

use crate::error::{Result, SchedulerError};
use crate::models::args::TaskArgs;

/// Task lifecycle states, stored as uppercase text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "TEXT", rename_all = "UPPERCASE")]
pub enum TaskState {
    /// Waiting in the queue, eligible for claim
    Created,
    /// Claimed by a Processor and running
    Started,
    /// Handler reported success; `output` holds the result
    Succeeded,
    /// Retries exhausted; `error` holds the last failure
    Failed,
    /// Overstayed a timeout budget; outcome unknown
    Expired,
    /// Cancelled by a caller before completion
    Cancelled,
}

/// Edges of the task state graph. `Started -> Created` is the retry edge.
pub const VALID_TRANSITIONS: &[(TaskState, TaskState)] = &[
    (TaskState::Created, TaskState::Started),
    (TaskState::Created, TaskState::Cancelled),
    (TaskState::Created, TaskState::Expired),
    (TaskState::Started, TaskState::Succeeded),
    (TaskState::Started, TaskState::Failed),
    (TaskState::Started, TaskState::Cancelled),
    (TaskState::Started, TaskState::Expired),
    (TaskState::Started, TaskState::Created),
];

impl TaskState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Expired | Self::Cancelled
        )
    }

    /// Check whether `self -> target` is an edge of the state graph
    pub fn can_transition_to(&self, target: TaskState) -> bool {
        VALID_TRANSITIONS.contains(&(*self, target))
    }

    /// States from which `target` is directly reachable
    pub fn sources_of(target: TaskState) -> Vec<TaskState> {
        VALID_TRANSITIONS
            .iter()
            .filter(|(_, to)| *to == target)
            .map(|(from, _)| *from)
            .collect()
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "CREATED"),
            Self::Started => write!(f, "STARTED"),
            Self::Succeeded => write!(f, "SUCCEEDED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl std::str::FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(Self::Created),
            "STARTED" => Ok(Self::Started),
            "SUCCEEDED" => Ok(Self::Succeeded),
            "FAILED" => Ok(Self::Failed),
            "EXPIRED" => Ok(Self::Expired),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid task state: {s}")),
        }
    }
}

impl Default for TaskState {
    fn default() -> Self {
        Self::Created
    }
}

/// A durable task row
///
/// Maps to the `tasks` table. Wire representation is camelCase; columns are
/// snake_case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub group_key: String,
    /// Max simultaneously STARTED tasks in the group; 0 means unbounded
    pub group_max_concurrency: i32,
    /// Owner-scoped exclusivity key; NULL disables the constraint
    pub owner_key: Option<String>,
    /// Opaque args blob, shape-validated at admission (see [`TaskArgs`])
    pub payload: serde_json::Value,
    pub state: TaskState,
    pub retry_count: i32,
    pub retry_max: i32,
    pub created_to_started_timeout_secs: i32,
    pub started_to_completed_timeout_secs: i32,
    pub heartbeat_timeout_secs: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub terminated_at: Option<DateTime<Utc>>,
    /// Terminal success payload; mutually exclusive with `error`
    pub output: Option<serde_json::Value>,
    /// Terminal failure payload, expiry reason or cancellation reason
    pub error: Option<serde_json::Value>,
    /// Incremented on every state transition
    pub version: i64,
}

/// New task for creation (without generated fields)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub name: String,
    pub group_key: String,
    pub group_max_concurrency: i32,
    pub owner_key: Option<String>,
    pub payload: serde_json::Value,
    pub retry_count: i32,
    pub retry_max: i32,
    pub created_to_started_timeout_secs: i32,
    pub started_to_completed_timeout_secs: i32,
    pub heartbeat_timeout_secs: i32,
}

impl NewTask {
    /// Reject structurally invalid props before they reach the store
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(SchedulerError::Validation("name must not be empty".into()));
        }
        if self.group_key.is_empty() {
            return Err(SchedulerError::Validation(
                "groupKey must not be empty".into(),
            ));
        }
        if self.group_max_concurrency < 0 {
            return Err(SchedulerError::Validation(
                "groupMaxConcurrency must not be negative".into(),
            ));
        }
        if self.created_to_started_timeout_secs <= 0
            || self.started_to_completed_timeout_secs <= 0
            || self.heartbeat_timeout_secs <= 0
        {
            return Err(SchedulerError::Validation(
                "timeout settings must be positive".into(),
            ));
        }
        if self.retry_count < 0 || self.retry_max < 0 {
            return Err(SchedulerError::Validation(
                "retry settings must not be negative".into(),
            ));
        }
        if self.retry_count > self.retry_max {
            return Err(SchedulerError::Validation(format!(
                "retry count {} exceeds retry max {}",
                self.retry_count, self.retry_max
            )));
        }
        Ok(())
    }
}

/// Filters for read-only task search with keyset pagination
#[derive(Debug, Clone)]
pub struct TaskFilter {
    pub ids: Option<Vec<Uuid>>,
    pub group_key: Option<String>,
    pub states: Option<Vec<TaskState>>,
    pub owner_key: Option<String>,
    pub cursor: Option<SearchCursor>,
    pub limit: i64,
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self {
            ids: None,
            group_key: None,
            states: None,
            owner_key: None,
            cursor: None,
            limit: 50,
        }
    }
}

/// Opaque keyset cursor over `(created_at, id)`
///
/// Serialized as `<created_at_micros>:<task_id>`; callers pass it back
/// verbatim to fetch the next page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchCursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

impl SearchCursor {
    pub fn after(task: &Task) -> Self {
        Self {
            created_at: task.created_at,
            id: task.id,
        }
    }
}

impl fmt::Display for SearchCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.created_at.timestamp_micros(), self.id)
    }
}

impl std::str::FromStr for SearchCursor {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (micros, id) = s
            .split_once(':')
            .ok_or_else(|| format!("invalid cursor: {s}"))?;
        let micros: i64 = micros
            .parse()
            .map_err(|_| format!("invalid cursor timestamp: {s}"))?;
        let created_at = DateTime::from_timestamp_micros(micros)
            .ok_or_else(|| format!("cursor timestamp out of range: {s}"))?;
        let id = Uuid::parse_str(id).map_err(|_| format!("invalid cursor id: {s}"))?;
        Ok(Self { created_at, id })
    }
}

impl Task {
    /// Parse the payload into its typed args shape
    pub fn args(&self) -> Result<TaskArgs> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| SchedulerError::Validation(format!("malformed task args: {e}")))
    }

    /// Insert a CREATED task
    pub async fn create(pool: &PgPool, new_task: NewTask) -> std::result::Result<Task, sqlx::Error> {
        let query = r#"
            INSERT INTO tasks (
                id, name, group_key, group_max_concurrency, owner_key, payload, state,
                retry_count, retry_max,
                created_to_started_timeout_secs, started_to_completed_timeout_secs,
                heartbeat_timeout_secs, created_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'CREATED', $7, $8, $9, $10, $11, now(), 1)
            RETURNING *
        "#;

        sqlx::query_as::<_, Task>(query)
            .bind(Uuid::new_v4())
            .bind(&new_task.name)
            .bind(&new_task.group_key)
            .bind(new_task.group_max_concurrency)
            .bind(&new_task.owner_key)
            .bind(&new_task.payload)
            .bind(new_task.retry_count)
            .bind(new_task.retry_max)
            .bind(new_task.created_to_started_timeout_secs)
            .bind(new_task.started_to_completed_timeout_secs)
            .bind(new_task.heartbeat_timeout_secs)
            .fetch_one(pool)
            .await
    }

    /// Look up a task by id
    pub async fn find_by_id(
        pool: &PgPool,
        id: Uuid,
    ) -> std::result::Result<Option<Task>, sqlx::Error> {
        sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Atomically claim up to `limit` eligible CREATED tasks of a group
    ///
    /// Eligibility: FIFO by `(created_at, id)`, one task per `owner_key` at a
    /// time (counting both already-STARTED owners and duplicates within this
    /// batch), and no more admissions than keep the group's STARTED count at
    /// or below `group_max_concurrency`. The admission count is serialized
    /// per group with an advisory transaction lock; owned candidates
    /// additionally serialize per owner, since an owner's tasks can live in
    /// different groups and the group lock alone would let two groups admit
    /// the same owner at once. Row locks are taken `SKIP LOCKED`. When
    /// `owner_key` is given, only that owner's tasks are considered.
    pub async fn claim_batch(
        pool: &PgPool,
        group_key: &str,
        limit: i64,
        owner_key: Option<&str>,
    ) -> std::result::Result<Vec<Task>, sqlx::Error> {
        let query = r#"
            WITH running AS (
                SELECT count(*) AS cnt
                FROM tasks
                WHERE group_key = $1 AND state = 'STARTED'
            ),
            candidates AS (
                SELECT t.id, t.created_at, t.group_max_concurrency,
                    CASE WHEN t.owner_key IS NULL THEN 1
                         ELSE row_number() OVER (
                             PARTITION BY t.owner_key ORDER BY t.created_at ASC, t.id ASC
                         )
                    END AS owner_pos
                FROM tasks t
                WHERE t.group_key = $1
                  AND t.state = 'CREATED'
                  AND ($3::text IS NULL OR t.owner_key = $3)
                  AND (t.owner_key IS NULL OR t.owner_key = ANY($4::text[]))
                  AND (t.owner_key IS NULL OR NOT EXISTS (
                      SELECT 1 FROM tasks o
                      WHERE o.owner_key = t.owner_key AND o.state = 'STARTED'
                  ))
            ),
            admitted AS (
                SELECT c.id, c.created_at, c.group_max_concurrency,
                       row_number() OVER (ORDER BY c.created_at ASC, c.id ASC) AS pos
                FROM candidates c
                WHERE c.owner_pos = 1
            ),
            capped AS (
                SELECT a.id
                FROM admitted a, running g
                WHERE a.group_max_concurrency = 0
                   OR g.cnt + a.pos <= a.group_max_concurrency
                ORDER BY a.pos ASC
                LIMIT $2
            ),
            locked AS (
                SELECT t.id
                FROM tasks t
                WHERE t.id IN (SELECT id FROM capped)
                ORDER BY t.created_at ASC, t.id ASC
                FOR UPDATE SKIP LOCKED
            )
            UPDATE tasks t
            SET state = 'STARTED',
                started_at = now(),
                last_heartbeat_at = now(),
                version = version + 1
            FROM locked l
            WHERE t.id = l.id
              AND t.state = 'CREATED'
            RETURNING t.*
        "#;

        let mut tx = pool.begin().await?;

        // Serializes same-group admission; released at commit
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(group_key)
            .execute(&mut *tx)
            .await?;

        // Owners of the queued candidates, sorted so concurrent claimers
        // acquire their locks in the same order
        let owners: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT owner_key FROM tasks
            WHERE group_key = $1
              AND state = 'CREATED'
              AND owner_key IS NOT NULL
              AND ($2::text IS NULL OR owner_key = $2)
            ORDER BY owner_key ASC
            "#,
        )
        .bind(group_key)
        .bind(owner_key)
        .fetch_all(&mut *tx)
        .await?;

        // Seed 1 keeps the owner namespace apart from the group locks. The
        // claim below only considers owners locked here; a task inserted
        // after this point waits for the next poll.
        for owner in &owners {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 1))")
                .bind(owner)
                .execute(&mut *tx)
                .await?;
        }

        let mut tasks = sqlx::query_as::<_, Task>(query)
            .bind(group_key)
            .bind(limit)
            .bind(owner_key)
            .bind(&owners)
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;

        tasks.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(tasks)
    }

    /// The pre-admission-control claim: plain FIFO, no group cap, no owner
    /// exclusivity. Kept behind the `flagDequeueLegacy` wire flag.
    pub async fn claim_batch_legacy(
        pool: &PgPool,
        group_key: &str,
        limit: i64,
    ) -> std::result::Result<Vec<Task>, sqlx::Error> {
        let query = r#"
            UPDATE tasks t
            SET state = 'STARTED',
                started_at = now(),
                last_heartbeat_at = now(),
                version = version + 1
            WHERE t.id IN (
                SELECT id FROM tasks
                WHERE group_key = $1 AND state = 'CREATED'
                ORDER BY created_at ASC, id ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING t.*
        "#;

        let mut tasks = sqlx::query_as::<_, Task>(query)
            .bind(group_key)
            .bind(limit)
            .fetch_all(pool)
            .await?;

        tasks.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(tasks)
    }

    /// Refresh `last_heartbeat_at` for a STARTED task
    ///
    /// `None` means the task is missing or not STARTED; the caller decides
    /// which.
    pub async fn record_heartbeat(
        pool: &PgPool,
        id: Uuid,
    ) -> std::result::Result<Option<Task>, sqlx::Error> {
        let query = r#"
            UPDATE tasks
            SET last_heartbeat_at = now()
            WHERE id = $1 AND state = 'STARTED'
            RETURNING *
        "#;

        sqlx::query_as::<_, Task>(query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Conditionally transition into a terminal state
    ///
    /// The update only applies while the row sits in a state the graph allows
    /// as a source of `target`; `outcome` lands in `output` for SUCCEEDED and
    /// in `error` for every other terminal state. `None` means a concurrent
    /// transition won.
    pub async fn transition_terminal(
        pool: &PgPool,
        id: Uuid,
        target: TaskState,
        outcome: Option<&serde_json::Value>,
    ) -> std::result::Result<Option<Task>, sqlx::Error> {
        debug_assert!(target.is_terminal());

        let allowed: Vec<String> = TaskState::sources_of(target)
            .into_iter()
            .map(|s| s.to_string())
            .collect();

        let query = r#"
            UPDATE tasks
            SET state = $2::text,
                output = CASE WHEN $2 = 'SUCCEEDED' THEN $3::jsonb ELSE output END,
                error  = CASE WHEN $2 <> 'SUCCEEDED' THEN $3::jsonb ELSE error END,
                terminated_at = now(),
                version = version + 1
            WHERE id = $1
              AND state = ANY($4::text[])
            RETURNING *
        "#;

        sqlx::query_as::<_, Task>(query)
            .bind(id)
            .bind(target.to_string())
            .bind(outcome)
            .bind(allowed)
            .fetch_optional(pool)
            .await
    }

    /// Reopen a STARTED task as CREATED for its next attempt
    ///
    /// Applies only while retries remain; bumps `retry_count`, clears the
    /// attempt timestamps. `None` means no retry budget or a lost race.
    pub async fn reopen_for_retry(
        pool: &PgPool,
        id: Uuid,
    ) -> std::result::Result<Option<Task>, sqlx::Error> {
        let query = r#"
            UPDATE tasks
            SET state = 'CREATED',
                retry_count = retry_count + 1,
                started_at = NULL,
                last_heartbeat_at = NULL,
                version = version + 1
            WHERE id = $1
              AND state = 'STARTED'
              AND retry_count < retry_max
            RETURNING *
        "#;

        sqlx::query_as::<_, Task>(query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Expire every task that overstayed one of its timeout budgets
    ///
    /// CREATED tasks past `created_to_started_timeout_secs`, STARTED tasks
    /// past `started_to_completed_timeout_secs` or silent longer than
    /// `heartbeat_timeout_secs`. The reason lands in `error` as
    /// `{"reason": "<field>_exceeded"}`. Rows locked elsewhere are skipped
    /// and picked up on a later tick.
    pub async fn expire_overdue(
        pool: &PgPool,
        batch_size: i64,
    ) -> std::result::Result<Vec<Task>, sqlx::Error> {
        let query = r#"
            WITH overdue AS (
                SELECT id,
                    CASE
                        WHEN state = 'CREATED'
                            THEN '{"reason": "createdToStartedTimeoutSecs_exceeded"}'::jsonb
                        WHEN last_heartbeat_at + heartbeat_timeout_secs * INTERVAL '1 second' < now()
                            THEN '{"reason": "heartbeatTimeoutSecs_exceeded"}'::jsonb
                        ELSE '{"reason": "startedToCompletedTimeoutSecs_exceeded"}'::jsonb
                    END AS reason
                FROM tasks
                WHERE (
                    state = 'CREATED'
                    AND created_at + created_to_started_timeout_secs * INTERVAL '1 second' < now()
                ) OR (
                    state = 'STARTED'
                    AND (
                        last_heartbeat_at + heartbeat_timeout_secs * INTERVAL '1 second' < now()
                        OR started_at + started_to_completed_timeout_secs * INTERVAL '1 second' < now()
                    )
                )
                ORDER BY created_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE tasks t
            SET state = 'EXPIRED',
                error = o.reason,
                terminated_at = now(),
                version = version + 1
            FROM overdue o
            WHERE t.id = o.id
            RETURNING t.*
        "#;

        sqlx::query_as::<_, Task>(query)
            .bind(batch_size)
            .fetch_all(pool)
            .await
    }

    /// Read-only search ordered by `(created_at, id)` with keyset pagination
    pub async fn search(
        pool: &PgPool,
        filter: &TaskFilter,
    ) -> std::result::Result<Vec<Task>, sqlx::Error> {
        let states: Option<Vec<String>> = filter
            .states
            .as_ref()
            .map(|s| s.iter().map(|st| st.to_string()).collect());
        let (cursor_at, cursor_id) = match &filter.cursor {
            Some(c) => (Some(c.created_at), Some(c.id)),
            None => (None, None),
        };

        let query = r#"
            SELECT * FROM tasks
            WHERE ($1::uuid[] IS NULL OR id = ANY($1))
              AND ($2::text IS NULL OR group_key = $2)
              AND ($3::text[] IS NULL OR state = ANY($3))
              AND ($4::text IS NULL OR owner_key = $4)
              AND ($5::timestamptz IS NULL OR (created_at, id) > ($5, $6::uuid))
            ORDER BY created_at ASC, id ASC
            LIMIT $7
        "#;

        sqlx::query_as::<_, Task>(query)
            .bind(&filter.ids)
            .bind(&filter.group_key)
            .bind(states)
            .bind(&filter.owner_key)
            .bind(cursor_at)
            .bind(cursor_id)
            .bind(filter.limit)
            .fetch_all(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_terminal_states_have_no_outgoing_edges() {
        for (from, _) in VALID_TRANSITIONS {
            assert!(!from.is_terminal(), "{from} is terminal but has an edge");
        }
    }

    #[test]
    fn test_retry_edge_is_the_only_way_back_to_created() {
        let sources = TaskState::sources_of(TaskState::Created);
        assert_eq!(sources, vec![TaskState::Started]);
    }

    #[test]
    fn test_transition_graph_edges() {
        assert!(TaskState::Created.can_transition_to(TaskState::Started));
        assert!(TaskState::Created.can_transition_to(TaskState::Cancelled));
        assert!(TaskState::Created.can_transition_to(TaskState::Expired));
        assert!(TaskState::Started.can_transition_to(TaskState::Succeeded));
        assert!(TaskState::Started.can_transition_to(TaskState::Created));

        assert!(!TaskState::Created.can_transition_to(TaskState::Succeeded));
        assert!(!TaskState::Created.can_transition_to(TaskState::Failed));
        assert!(!TaskState::Succeeded.can_transition_to(TaskState::Started));
        assert!(!TaskState::Cancelled.can_transition_to(TaskState::Created));
        assert!(!TaskState::Expired.can_transition_to(TaskState::Started));
    }

    #[test]
    fn test_state_string_conversion() {
        assert_eq!(TaskState::Created.to_string(), "CREATED");
        assert_eq!(
            "SUCCEEDED".parse::<TaskState>().unwrap(),
            TaskState::Succeeded
        );
        assert!("succeeded".parse::<TaskState>().is_err());
    }

    #[test]
    fn test_state_serde_uppercase() {
        let json = serde_json::to_string(&TaskState::Started).unwrap();
        assert_eq!(json, "\"STARTED\"");
        let parsed: TaskState = serde_json::from_str("\"EXPIRED\"").unwrap();
        assert_eq!(parsed, TaskState::Expired);
    }

    #[test]
    fn test_new_task_validation() {
        let valid = NewTask {
            name: "sync".into(),
            group_key: "sync:github".into(),
            group_max_concurrency: 0,
            owner_key: None,
            payload: serde_json::json!({}),
            retry_count: 0,
            retry_max: 3,
            created_to_started_timeout_secs: 30,
            started_to_completed_timeout_secs: 60,
            heartbeat_timeout_secs: 30,
        };
        assert!(valid.validate().is_ok());

        let mut bad_timeout = valid.clone();
        bad_timeout.heartbeat_timeout_secs = 0;
        assert!(bad_timeout.validate().is_err());

        let mut bad_retry = valid.clone();
        bad_retry.retry_count = 4;
        assert!(bad_retry.validate().is_err());

        let mut bad_group = valid.clone();
        bad_group.group_key = String::new();
        assert!(bad_group.validate().is_err());

        let mut negative_cap = valid;
        negative_cap.group_max_concurrency = -1;
        assert!(negative_cap.validate().is_err());
    }

    proptest! {
        #[test]
        fn prop_search_cursor_roundtrips(micros in 0_i64..4_102_444_800_000_000, bytes in any::<[u8; 16]>()) {
            let cursor = SearchCursor {
                created_at: DateTime::from_timestamp_micros(micros).unwrap(),
                id: Uuid::from_bytes(bytes),
            };
            let parsed: SearchCursor = cursor.to_string().parse().unwrap();
            prop_assert_eq!(parsed, cursor);
        }

        #[test]
        fn prop_cursor_rejects_garbage(s in "[a-z0-9 ]{0,24}") {
            // no colon separator, must never parse
            prop_assert!(s.parse::<SearchCursor>().is_err());
        }
    }
}
