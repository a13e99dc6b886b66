// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Activity Executor
//!
//! Runs one leased activity attempt against [`AgentActivities`], bounded by
//! the start-to-close timeout, and reports the outcome to the journal:
//!
//! - success: `ActivityCompleted` is appended to history
//! - retryable failure with attempts left: the task is rescheduled after the
//!   policy's backoff delay
//! - non-retryable failure or exhausted attempts: `ActivityFailed` is appended
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Apply the retry policy to activity attempts

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::activity::{ActivityError, ActivityFailure, ActivityResult, AgentActivities};
use crate::domain::journal::{ActivityTask, JournalError, WorkflowJournal};
use crate::domain::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Completed,
    RetryScheduled { next_attempt: u32, delay: Duration },
    Failed(ActivityFailure),
}

#[derive(Clone)]
pub struct ActivityExecutor {
    activities: Arc<dyn AgentActivities>,
    journal: Arc<dyn WorkflowJournal>,
    policy: RetryPolicy,
}

impl ActivityExecutor {
    pub fn new(
        activities: Arc<dyn AgentActivities>,
        journal: Arc<dyn WorkflowJournal>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            activities,
            journal,
            policy,
        }
    }

    /// Run `task` and record its outcome as of `now`.
    pub async fn execute(
        &self,
        task: &ActivityTask,
        now: DateTime<Utc>,
    ) -> Result<AttemptOutcome, JournalError> {
        let result = self.attempt(task).await;
        self.record(task, result, now).await
    }

    /// Call the activity once, bounded by the start-to-close timeout.
    pub async fn attempt(&self, task: &ActivityTask) -> Result<ActivityResult, ActivityError> {
        metrics::counter!("hyyve_activity_attempts_total", "activity" => task.request.name())
            .increment(1);

        match tokio::time::timeout(
            self.policy.start_to_close_timeout,
            self.activities.execute(&task.request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ActivityError::Timeout(self.policy.start_to_close_timeout)),
        }
    }

    /// Report the result of an attempt to the journal.
    pub async fn record(
        &self,
        task: &ActivityTask,
        result: Result<ActivityResult, ActivityError>,
        now: DateTime<Utc>,
    ) -> Result<AttemptOutcome, JournalError> {
        match result {
            Ok(output) => {
                self.journal.complete_activity_task(task, &output, now).await?;
                info!(
                    workflow_id = %task.workflow_id,
                    activity = task.request.name(),
                    attempt = task.attempt,
                    "Activity completed"
                );
                Ok(AttemptOutcome::Completed)
            }
            Err(error) => self.handle_failure(task, error, now).await,
        }
    }

    async fn handle_failure(
        &self,
        task: &ActivityTask,
        error: ActivityError,
        now: DateTime<Utc>,
    ) -> Result<AttemptOutcome, JournalError> {
        let activity = task.request.name();
        let delay = if error.is_retryable() {
            self.policy.next_delay(task.attempt)
        } else {
            None
        };

        if let Some(delay) = delay {
            self.journal.retry_activity_task(task, delay, now).await?;
            warn!(
                workflow_id = %task.workflow_id,
                activity,
                attempt = task.attempt,
                retry_in_ms = delay.as_millis() as u64,
                error = %error,
                "Activity attempt failed, retrying"
            );
            return Ok(AttemptOutcome::RetryScheduled {
                next_attempt: task.attempt + 1,
                delay,
            });
        }

        let failure = ActivityFailure::from_error(&error, task.attempt);
        self.journal.fail_activity_task(task, &failure, now).await?;
        metrics::counter!("hyyve_activity_failures_total", "activity" => activity).increment(1);
        warn!(
            workflow_id = %task.workflow_id,
            activity,
            attempt = task.attempt,
            non_retryable = failure.non_retryable,
            error = %error,
            "Activity failed"
        );
        Ok(AttemptOutcome::Failed(failure))
    }
}
