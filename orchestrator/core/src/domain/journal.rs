// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Workflow Journal (Durable Execution Backend)
//!
//! Persistence contract for workflow histories and the three kinds of work
//! derived from them: workflow tasks, activity tasks and timers. Defined in
//! the domain layer, implemented in `crate::infrastructure::journal`.
//!
//! | Implementation | Use |
//! |----------------|-----|
//! | `InMemoryJournal` | tests, single-process development |
//! | `PostgresJournal` | production, survives worker restarts |
//!
//! Every operation that depends on wall-clock time receives `now` from the
//! caller; journals never read the clock themselves.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Repository interface for the event-sourced workflow store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::domain::activity::{ActivityFailure, ActivityRequest, ActivityResult};
use crate::domain::history::{Command, CommandId, SequencedEvent, WorkflowId};
use crate::domain::signal::WorkflowSignal;
use crate::domain::task::TaskInput;
use crate::domain::workflow::{WorkflowOutput, WorkflowStatus};

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Workflow {0} already exists")]
    WorkflowAlreadyExists(WorkflowId),

    #[error("Workflow {0} not found")]
    WorkflowNotFound(WorkflowId),

    #[error("History of workflow {workflow_id} moved past seq {expected_head}")]
    Conflict {
        workflow_id: WorkflowId,
        expected_head: i64,
    },
}

impl From<serde_json::Error> for JournalError {
    fn from(e: serde_json::Error) -> Self {
        JournalError::Serialization(e.to_string())
    }
}

/// Outcome of delivering a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalDelivery {
    /// Appended to history; the workflow will observe it.
    Delivered,
    /// The workflow already completed; nothing was recorded.
    Ignored,
}

/// A leased request to advance one workflow.
#[derive(Debug, Clone)]
pub struct WorkflowTask {
    pub workflow_id: WorkflowId,
    pub workflow_type: String,
    pub history: Vec<SequencedEvent>,
}

impl WorkflowTask {
    /// Sequence number of the last event the task was built from.
    pub fn head(&self) -> i64 {
        self.history.last().map(|e| e.seq).unwrap_or(0)
    }
}

/// A leased attempt of a scheduled activity.
#[derive(Debug, Clone)]
pub struct ActivityTask {
    pub workflow_id: WorkflowId,
    pub activity_id: CommandId,
    pub request: ActivityRequest,
    /// 1 for the first attempt.
    pub attempt: u32,
    pub scheduled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDescription {
    pub workflow_id: WorkflowId,
    pub workflow_type: String,
    pub task_queue: String,
    pub status: WorkflowStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<WorkflowOutput>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait WorkflowJournal: Send + Sync {
    /// Record `WorkflowStarted` and make the first workflow task available.
    async fn start_workflow(
        &self,
        workflow_id: &WorkflowId,
        workflow_type: &str,
        task_queue: &str,
        input: &TaskInput,
        now: DateTime<Utc>,
    ) -> Result<(), JournalError>;

    /// Append a signal to a running workflow. Closed workflows ignore it.
    async fn signal_workflow(
        &self,
        workflow_id: &WorkflowId,
        signal: &WorkflowSignal,
        now: DateTime<Utc>,
    ) -> Result<SignalDelivery, JournalError>;

    /// Lease the next workflow with unprocessed events on `task_queue`.
    async fn poll_workflow_task(
        &self,
        task_queue: &str,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<WorkflowTask>, JournalError>;

    /// Atomically append `commands` plus a batch marker and materialise them
    /// (activity tasks, timers, completion). Fails with
    /// [`JournalError::Conflict`] when history grew since the task was leased;
    /// the task then stays pending.
    async fn complete_workflow_task(
        &self,
        task: &WorkflowTask,
        commands: &[Command],
        identity: &str,
        now: DateTime<Utc>,
    ) -> Result<(), JournalError>;

    /// Lease the next visible activity attempt on `task_queue`.
    async fn poll_activity_task(
        &self,
        task_queue: &str,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<ActivityTask>, JournalError>;

    /// Record a successful attempt. Stale attempts are discarded.
    async fn complete_activity_task(
        &self,
        task: &ActivityTask,
        result: &ActivityResult,
        now: DateTime<Utc>,
    ) -> Result<(), JournalError>;

    /// Record the terminal failure of an activity.
    async fn fail_activity_task(
        &self,
        task: &ActivityTask,
        failure: &ActivityFailure,
        now: DateTime<Utc>,
    ) -> Result<(), JournalError>;

    /// Make the next attempt visible after `delay`.
    async fn retry_activity_task(
        &self,
        task: &ActivityTask,
        delay: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), JournalError>;

    /// Append `TimerFired` for every timer on `task_queue` due at `now`.
    async fn fire_due_timers(
        &self,
        task_queue: &str,
        now: DateTime<Utc>,
    ) -> Result<usize, JournalError>;

    async fn describe_workflow(
        &self,
        workflow_id: &WorkflowId,
    ) -> Result<Option<WorkflowDescription>, JournalError>;

    async fn history(&self, workflow_id: &WorkflowId) -> Result<Vec<SequencedEvent>, JournalError>;

    /// Release backend resources.
    async fn close(&self);
}

/// Convert a std duration into a chrono offset, clamped to a century.
pub fn chrono_offset(duration: Duration) -> chrono::Duration {
    let ceiling = chrono::Duration::weeks(52 * 100);
    chrono::Duration::from_std(duration)
        .map(|d| d.min(ceiling))
        .unwrap_or(ceiling)
}
