// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! PostgreSQL Workflow Journal
//!
//! Durable implementation of [`WorkflowJournal`]. Each namespace gets its own
//! schema, created on first connect.
//!
//! # Schema
//!
//! - `workflow_executions`: one row per workflow; status, output, pending
//!   decision flag and decision lease
//! - `workflow_history`: append-only `(workflow_id, seq)` event log (JSONB)
//! - `activity_tasks`: scheduled activity attempts with visibility and lease
//! - `workflow_timers`: armed timers and their fire time
//!
//! # Concurrency
//!
//! Sequence numbers are allocated while holding the workflow row lock, so
//! appends to one history are serialised. Pollers claim work with
//! `FOR UPDATE SKIP LOCKED`. Every transaction that touches a workflow and
//! its tasks locks the workflow row first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, Postgres};
use sqlx::types::Json;
use sqlx::{Row, Transaction};
use std::time::Duration;
use tracing::{debug, info};

use crate::domain::activity::{ActivityFailure, ActivityRequest, ActivityResult};
use crate::domain::history::{Command, CommandId, HistoryEvent, SequencedEvent, WorkflowId};
use crate::domain::journal::{
    chrono_offset, ActivityTask, JournalError, SignalDelivery, WorkflowDescription,
    WorkflowJournal, WorkflowTask,
};
use crate::domain::signal::WorkflowSignal;
use crate::domain::task::TaskInput;
use crate::domain::workflow::{WorkflowOutput, WorkflowStatus};
use crate::infrastructure::db::Database;

fn db_err(e: sqlx::Error) -> JournalError {
    JournalError::Database(e.to_string())
}

/// Schema holding the tables of `namespace`.
pub fn schema_for_namespace(namespace: &str) -> String {
    let sanitized: String = namespace
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("hyyve_{}", sanitized)
}

pub struct PostgresJournal {
    pool: PgPool,
    schema: String,
}

impl PostgresJournal {
    /// Connect to `address` and make sure the namespace schema exists.
    pub async fn connect(
        address: &str,
        namespace: &str,
        max_connections: u32,
    ) -> Result<Self, JournalError> {
        let database = Database::with_max_connections(address, max_connections)
            .await
            .map_err(|e| JournalError::Database(format!("{:#}", e)))?;
        Self::new(&database, namespace).await
    }

    pub async fn new(database: &Database, namespace: &str) -> Result<Self, JournalError> {
        let journal = Self {
            pool: database.get_pool().clone(),
            schema: schema_for_namespace(namespace),
        };
        journal.ensure_schema().await?;
        info!(namespace, schema = %journal.schema, "Workflow journal ready");
        Ok(journal)
    }

    fn table(&self, name: &str) -> String {
        format!("\"{}\".{}", self.schema, name)
    }

    async fn ensure_schema(&self) -> Result<(), JournalError> {
        let executions = self.table("workflow_executions");
        let history = self.table("workflow_history");
        let activities = self.table("activity_tasks");
        let timers = self.table("workflow_timers");

        let statements = vec![
            format!("CREATE SCHEMA IF NOT EXISTS \"{}\"", self.schema),
            format!(
                "CREATE TABLE IF NOT EXISTS {executions} (
                    workflow_id TEXT PRIMARY KEY,
                    workflow_type TEXT NOT NULL,
                    task_queue TEXT NOT NULL,
                    status TEXT NOT NULL,
                    output JSONB,
                    needs_decision BOOLEAN NOT NULL DEFAULT FALSE,
                    decision_locked_until TIMESTAMPTZ,
                    started_at TIMESTAMPTZ NOT NULL,
                    closed_at TIMESTAMPTZ
                )"
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS idx_workflow_executions_pending
                 ON {executions} (task_queue, started_at) WHERE needs_decision"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {history} (
                    workflow_id TEXT NOT NULL REFERENCES {executions} (workflow_id) ON DELETE CASCADE,
                    seq BIGINT NOT NULL,
                    event JSONB NOT NULL,
                    recorded_at TIMESTAMPTZ NOT NULL,
                    PRIMARY KEY (workflow_id, seq)
                )"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {activities} (
                    workflow_id TEXT NOT NULL,
                    activity_id BIGINT NOT NULL,
                    task_queue TEXT NOT NULL,
                    request JSONB NOT NULL,
                    attempt BIGINT NOT NULL,
                    visible_at TIMESTAMPTZ NOT NULL,
                    locked_until TIMESTAMPTZ,
                    scheduled_at TIMESTAMPTZ NOT NULL,
                    PRIMARY KEY (workflow_id, activity_id)
                )"
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS idx_activity_tasks_visible
                 ON {activities} (task_queue, visible_at)"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {timers} (
                    workflow_id TEXT NOT NULL,
                    timer_id BIGINT NOT NULL,
                    task_queue TEXT NOT NULL,
                    fire_at TIMESTAMPTZ NOT NULL,
                    PRIMARY KEY (workflow_id, timer_id)
                )"
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS idx_workflow_timers_due
                 ON {timers} (task_queue, fire_at)"
            ),
        ];

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        // Workers starting together would otherwise race on CREATE SCHEMA.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&self.schema)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        for statement in &statements {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)
    }

    /// Lock the workflow row; returns its status and task queue.
    async fn lock_workflow(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        workflow_id: &WorkflowId,
    ) -> Result<Option<(WorkflowStatus, String)>, JournalError> {
        let row = sqlx::query(&format!(
            "SELECT status, task_queue FROM {} WHERE workflow_id = $1 FOR UPDATE",
            self.table("workflow_executions")
        ))
        .bind(workflow_id.as_str())
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_err)?;

        match row {
            Some(row) => {
                let status: String = row.try_get("status").map_err(db_err)?;
                let task_queue: String = row.try_get("task_queue").map_err(db_err)?;
                let status = WorkflowStatus::parse(&status).ok_or_else(|| {
                    JournalError::Serialization(format!("Unknown workflow status '{}'", status))
                })?;
                Ok(Some((status, task_queue)))
            }
            None => Ok(None),
        }
    }

    async fn head(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        workflow_id: &WorkflowId,
    ) -> Result<i64, JournalError> {
        let head: i64 = sqlx::query_scalar(&format!(
            "SELECT COALESCE(MAX(seq), 0) FROM {} WHERE workflow_id = $1",
            self.table("workflow_history")
        ))
        .bind(workflow_id.as_str())
        .fetch_one(&mut **tx)
        .await
        .map_err(db_err)?;
        Ok(head)
    }

    async fn append(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        workflow_id: &WorkflowId,
        seq: i64,
        event: &HistoryEvent,
        now: DateTime<Utc>,
    ) -> Result<(), JournalError> {
        sqlx::query(&format!(
            "INSERT INTO {} (workflow_id, seq, event, recorded_at) VALUES ($1, $2, $3, $4)",
            self.table("workflow_history")
        ))
        .bind(workflow_id.as_str())
        .bind(seq)
        .bind(Json(event))
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn mark_needs_decision(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        workflow_id: &WorkflowId,
    ) -> Result<(), JournalError> {
        sqlx::query(&format!(
            "UPDATE {} SET needs_decision = TRUE WHERE workflow_id = $1",
            self.table("workflow_executions")
        ))
        .bind(workflow_id.as_str())
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    /// Append an activity outcome if `task` is still the current attempt.
    async fn resolve_activity(
        &self,
        task: &ActivityTask,
        event: HistoryEvent,
        now: DateTime<Utc>,
    ) -> Result<(), JournalError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let status = self.lock_workflow(&mut tx, &task.workflow_id).await?;

        let deleted = sqlx::query(&format!(
            "DELETE FROM {} WHERE workflow_id = $1 AND activity_id = $2 AND attempt = $3",
            self.table("activity_tasks")
        ))
        .bind(task.workflow_id.as_str())
        .bind(i64::from(task.activity_id))
        .bind(i64::from(task.attempt))
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .rows_affected();

        if deleted == 0 {
            debug!(
                workflow_id = %task.workflow_id,
                activity_id = task.activity_id,
                attempt = task.attempt,
                "Discarding outcome of stale activity attempt"
            );
        } else if matches!(status, Some((WorkflowStatus::Running, _))) {
            let seq = self.head(&mut tx, &task.workflow_id).await? + 1;
            self.append(&mut tx, &task.workflow_id, seq, &event, now).await?;
            self.mark_needs_decision(&mut tx, &task.workflow_id).await?;
        }

        tx.commit().await.map_err(db_err)
    }

    async fn load_history(
        &self,
        workflow_id: &WorkflowId,
    ) -> Result<Vec<SequencedEvent>, JournalError> {
        let rows = sqlx::query(&format!(
            "SELECT seq, event, recorded_at FROM {} WHERE workflow_id = $1 ORDER BY seq ASC",
            self.table("workflow_history")
        ))
        .bind(workflow_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter()
            .map(|row| {
                let event: Json<HistoryEvent> = row.try_get("event").map_err(db_err)?;
                Ok(SequencedEvent {
                    seq: row.try_get("seq").map_err(db_err)?,
                    recorded_at: row.try_get("recorded_at").map_err(db_err)?,
                    event: event.0,
                })
            })
            .collect()
    }
}

#[async_trait]
impl WorkflowJournal for PostgresJournal {
    async fn start_workflow(
        &self,
        workflow_id: &WorkflowId,
        workflow_type: &str,
        task_queue: &str,
        input: &TaskInput,
        now: DateTime<Utc>,
    ) -> Result<(), JournalError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let inserted = sqlx::query(&format!(
            "INSERT INTO {} (workflow_id, workflow_type, task_queue, status, needs_decision, started_at)
             VALUES ($1, $2, $3, $4, TRUE, $5)
             ON CONFLICT (workflow_id) DO NOTHING",
            self.table("workflow_executions")
        ))
        .bind(workflow_id.as_str())
        .bind(workflow_type)
        .bind(task_queue)
        .bind(WorkflowStatus::Running.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .rows_affected();

        if inserted == 0 {
            return Err(JournalError::WorkflowAlreadyExists(workflow_id.clone()));
        }

        let started = HistoryEvent::WorkflowStarted {
            workflow_type: workflow_type.to_string(),
            task_queue: task_queue.to_string(),
            input: input.clone(),
        };
        self.append(&mut tx, workflow_id, 1, &started, now).await?;
        tx.commit().await.map_err(db_err)
    }

    async fn signal_workflow(
        &self,
        workflow_id: &WorkflowId,
        signal: &WorkflowSignal,
        now: DateTime<Utc>,
    ) -> Result<SignalDelivery, JournalError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        match self.lock_workflow(&mut tx, workflow_id).await? {
            None => Err(JournalError::WorkflowNotFound(workflow_id.clone())),
            Some((WorkflowStatus::Completed, _)) => Ok(SignalDelivery::Ignored),
            Some((WorkflowStatus::Running, _)) => {
                let seq = self.head(&mut tx, workflow_id).await? + 1;
                let event = HistoryEvent::SignalReceived {
                    signal: signal.clone(),
                };
                self.append(&mut tx, workflow_id, seq, &event, now).await?;
                self.mark_needs_decision(&mut tx, workflow_id).await?;
                tx.commit().await.map_err(db_err)?;
                Ok(SignalDelivery::Delivered)
            }
        }
    }

    async fn poll_workflow_task(
        &self,
        task_queue: &str,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<WorkflowTask>, JournalError> {
        let executions = self.table("workflow_executions");
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let row = sqlx::query(&format!(
            "SELECT workflow_id, workflow_type FROM {executions}
             WHERE task_queue = $1 AND status = $2 AND needs_decision
               AND (decision_locked_until IS NULL OR decision_locked_until <= $3)
             ORDER BY started_at ASC
             LIMIT 1
             FOR UPDATE SKIP LOCKED"
        ))
        .bind(task_queue)
        .bind(WorkflowStatus::Running.as_str())
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let workflow_id = WorkflowId::new(row.try_get::<String, _>("workflow_id").map_err(db_err)?);
        let workflow_type: String = row.try_get("workflow_type").map_err(db_err)?;

        sqlx::query(&format!(
            "UPDATE {executions} SET decision_locked_until = $2 WHERE workflow_id = $1"
        ))
        .bind(workflow_id.as_str())
        .bind(now + chrono_offset(lease))
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;

        let history = self.load_history(&workflow_id).await?;
        Ok(Some(WorkflowTask {
            workflow_id,
            workflow_type,
            history,
        }))
    }

    async fn complete_workflow_task(
        &self,
        task: &WorkflowTask,
        commands: &[Command],
        identity: &str,
        now: DateTime<Utc>,
    ) -> Result<(), JournalError> {
        let executions = self.table("workflow_executions");
        let activities = self.table("activity_tasks");
        let timers = self.table("workflow_timers");
        let workflow_id = &task.workflow_id;

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let (status, task_queue) = self
            .lock_workflow(&mut tx, workflow_id)
            .await?
            .ok_or_else(|| JournalError::WorkflowNotFound(workflow_id.clone()))?;

        let mut head = self.head(&mut tx, workflow_id).await?;
        if head != task.head() || status != WorkflowStatus::Running {
            sqlx::query(&format!(
                "UPDATE {executions} SET decision_locked_until = NULL WHERE workflow_id = $1"
            ))
            .bind(workflow_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
            tx.commit().await.map_err(db_err)?;
            return Err(JournalError::Conflict {
                workflow_id: workflow_id.clone(),
                expected_head: task.head(),
            });
        }

        let mut completed = false;
        for command in commands {
            head += 1;
            self.append(&mut tx, workflow_id, head, &command.to_event(), now)
                .await?;

            match command {
                Command::ScheduleActivity {
                    activity_id,
                    request,
                } => {
                    sqlx::query(&format!(
                        "INSERT INTO {activities}
                            (workflow_id, activity_id, task_queue, request, attempt, visible_at, scheduled_at)
                         VALUES ($1, $2, $3, $4, 1, $5, $5)"
                    ))
                    .bind(workflow_id.as_str())
                    .bind(i64::from(*activity_id))
                    .bind(&task_queue)
                    .bind(Json(request))
                    .bind(now)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                }
                Command::StartTimer {
                    timer_id,
                    duration_secs,
                } => {
                    sqlx::query(&format!(
                        "INSERT INTO {timers} (workflow_id, timer_id, task_queue, fire_at)
                         VALUES ($1, $2, $3, $4)"
                    ))
                    .bind(workflow_id.as_str())
                    .bind(i64::from(*timer_id))
                    .bind(&task_queue)
                    .bind(now + chrono_offset(Duration::from_secs(*duration_secs)))
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                }
                Command::CancelTimer { timer_id } => {
                    sqlx::query(&format!(
                        "DELETE FROM {timers} WHERE workflow_id = $1 AND timer_id = $2"
                    ))
                    .bind(workflow_id.as_str())
                    .bind(i64::from(*timer_id))
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                }
                Command::CompleteWorkflow { output } => {
                    sqlx::query(&format!(
                        "UPDATE {executions} SET status = $2, output = $3, closed_at = $4
                         WHERE workflow_id = $1"
                    ))
                    .bind(workflow_id.as_str())
                    .bind(WorkflowStatus::Completed.as_str())
                    .bind(Json(output))
                    .bind(now)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                    completed = true;
                }
            }
        }

        let marker = HistoryEvent::WorkflowTaskCompleted {
            identity: identity.to_string(),
        };
        self.append(&mut tx, workflow_id, head + 1, &marker, now).await?;

        sqlx::query(&format!(
            "UPDATE {executions} SET needs_decision = FALSE, decision_locked_until = NULL
             WHERE workflow_id = $1"
        ))
        .bind(workflow_id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if completed {
            for table in [&activities, &timers] {
                sqlx::query(&format!("DELETE FROM {table} WHERE workflow_id = $1"))
                    .bind(workflow_id.as_str())
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
            }
        }

        tx.commit().await.map_err(db_err)
    }

    async fn poll_activity_task(
        &self,
        task_queue: &str,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<ActivityTask>, JournalError> {
        let activities = self.table("activity_tasks");
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let row = sqlx::query(&format!(
            "SELECT workflow_id, activity_id, request, attempt, scheduled_at FROM {activities}
             WHERE task_queue = $1 AND visible_at <= $2
               AND (locked_until IS NULL OR locked_until <= $2)
             ORDER BY visible_at ASC
             LIMIT 1
             FOR UPDATE SKIP LOCKED"
        ))
        .bind(task_queue)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let workflow_id = WorkflowId::new(row.try_get::<String, _>("workflow_id").map_err(db_err)?);
        let activity_id: i64 = row.try_get("activity_id").map_err(db_err)?;
        let request: Json<ActivityRequest> = row.try_get("request").map_err(db_err)?;
        let attempt: i64 = row.try_get("attempt").map_err(db_err)?;
        let scheduled_at: DateTime<Utc> = row.try_get("scheduled_at").map_err(db_err)?;

        sqlx::query(&format!(
            "UPDATE {activities} SET locked_until = $3 WHERE workflow_id = $1 AND activity_id = $2"
        ))
        .bind(workflow_id.as_str())
        .bind(activity_id)
        .bind(now + chrono_offset(lease))
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;

        Ok(Some(ActivityTask {
            workflow_id,
            activity_id: activity_id as CommandId,
            request: request.0,
            attempt: attempt as u32,
            scheduled_at,
        }))
    }

    async fn complete_activity_task(
        &self,
        task: &ActivityTask,
        result: &ActivityResult,
        now: DateTime<Utc>,
    ) -> Result<(), JournalError> {
        let event = HistoryEvent::ActivityCompleted {
            activity_id: task.activity_id,
            result: result.clone(),
        };
        self.resolve_activity(task, event, now).await
    }

    async fn fail_activity_task(
        &self,
        task: &ActivityTask,
        failure: &ActivityFailure,
        now: DateTime<Utc>,
    ) -> Result<(), JournalError> {
        let event = HistoryEvent::ActivityFailed {
            activity_id: task.activity_id,
            failure: failure.clone(),
        };
        self.resolve_activity(task, event, now).await
    }

    async fn retry_activity_task(
        &self,
        task: &ActivityTask,
        delay: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), JournalError> {
        sqlx::query(&format!(
            "UPDATE {} SET attempt = attempt + 1, visible_at = $4, locked_until = NULL
             WHERE workflow_id = $1 AND activity_id = $2 AND attempt = $3",
            self.table("activity_tasks")
        ))
        .bind(task.workflow_id.as_str())
        .bind(i64::from(task.activity_id))
        .bind(i64::from(task.attempt))
        .bind(now + chrono_offset(delay))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn fire_due_timers(
        &self,
        task_queue: &str,
        now: DateTime<Utc>,
    ) -> Result<usize, JournalError> {
        let timers = self.table("workflow_timers");
        let due = sqlx::query(&format!(
            "SELECT workflow_id, timer_id FROM {timers}
             WHERE task_queue = $1 AND fire_at <= $2
             ORDER BY fire_at ASC"
        ))
        .bind(task_queue)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut fired = 0;
        for row in due {
            let workflow_id =
                WorkflowId::new(row.try_get::<String, _>("workflow_id").map_err(db_err)?);
            let timer_id: i64 = row.try_get("timer_id").map_err(db_err)?;

            let mut tx = self.pool.begin().await.map_err(db_err)?;
            let status = self.lock_workflow(&mut tx, &workflow_id).await?;
            let deleted = sqlx::query(&format!(
                "DELETE FROM {timers} WHERE workflow_id = $1 AND timer_id = $2"
            ))
            .bind(workflow_id.as_str())
            .bind(timer_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();

            // Another worker fired it, or the workflow cancelled it meanwhile.
            if deleted > 0 && matches!(status, Some((WorkflowStatus::Running, _))) {
                let seq = self.head(&mut tx, &workflow_id).await? + 1;
                let event = HistoryEvent::TimerFired {
                    timer_id: timer_id as CommandId,
                };
                self.append(&mut tx, &workflow_id, seq, &event, now).await?;
                self.mark_needs_decision(&mut tx, &workflow_id).await?;
                fired += 1;
            }
            tx.commit().await.map_err(db_err)?;
        }
        Ok(fired)
    }

    async fn describe_workflow(
        &self,
        workflow_id: &WorkflowId,
    ) -> Result<Option<WorkflowDescription>, JournalError> {
        let row = sqlx::query(&format!(
            "SELECT workflow_type, task_queue, status, output, started_at, closed_at
             FROM {} WHERE workflow_id = $1",
            self.table("workflow_executions")
        ))
        .bind(workflow_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let status: String = row.try_get("status").map_err(db_err)?;
        let output: Option<Json<WorkflowOutput>> = row.try_get("output").map_err(db_err)?;

        Ok(Some(WorkflowDescription {
            workflow_id: workflow_id.clone(),
            workflow_type: row.try_get("workflow_type").map_err(db_err)?,
            task_queue: row.try_get("task_queue").map_err(db_err)?,
            status: WorkflowStatus::parse(&status).ok_or_else(|| {
                JournalError::Serialization(format!("Unknown workflow status '{}'", status))
            })?,
            output: output.map(|o| o.0),
            started_at: row.try_get("started_at").map_err(db_err)?,
            closed_at: row.try_get("closed_at").map_err(db_err)?,
        }))
    }

    async fn history(&self, workflow_id: &WorkflowId) -> Result<Vec<SequencedEvent>, JournalError> {
        let history = self.load_history(workflow_id).await?;
        if history.is_empty() {
            return Err(JournalError::WorkflowNotFound(workflow_id.clone()));
        }
        Ok(history)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
