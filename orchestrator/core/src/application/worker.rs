// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Workflow Worker
//!
//! Hosts the agent workflow and its three activities on one task queue.
//!
//! Each poll cycle:
//!
//! 1. fires due timers (`TimerFired` is appended to history)
//! 2. drains pending workflow tasks: replay history, check determinism,
//!    commit the new commands
//! 3. leases activity tasks up to the concurrency limit and runs them
//!
//! [`Worker::tick`] performs the same cycle inline for a caller-supplied
//! instant, until nothing more is runnable. [`Worker::run`] loops on the wall
//! clock until the shutdown token fires, then waits for in-flight activities
//! and closes the journal. It fails once `max_consecutive_poll_failures`
//! cycles in a row could not reach the journal.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Workflow task processing and the worker poll loop

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::activity_executor::ActivityExecutor;
use crate::domain::activity::{AgentActivities, AGENT_ACTIVITY_NAMES};
use crate::domain::history::Command;
use crate::domain::journal::{JournalError, WorkflowJournal, WorkflowTask};
use crate::domain::workflow::{AgentWorkflow, WorkflowOutput, AGENT_WORKFLOW_TYPE};
use crate::infrastructure::config::WorkerConfig;

/// Work performed by one [`Worker::tick`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub timers_fired: usize,
    pub workflow_tasks: usize,
    pub activity_attempts: usize,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.timers_fired == 0 && self.workflow_tasks == 0 && self.activity_attempts == 0
    }
}

/// `pid@hostname`, recorded in every workflow task marker.
pub fn default_identity() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_string());
    format!("{}@{}", std::process::id(), host)
}

pub struct Worker {
    journal: Arc<dyn WorkflowJournal>,
    executor: ActivityExecutor,
    task_queue: String,
    identity: String,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(
        journal: Arc<dyn WorkflowJournal>,
        activities: Arc<dyn AgentActivities>,
        task_queue: impl Into<String>,
        config: WorkerConfig,
    ) -> Self {
        let executor =
            ActivityExecutor::new(activities, journal.clone(), config.retry_policy.clone());
        Self {
            journal,
            executor,
            task_queue: task_queue.into(),
            identity: default_identity(),
            config,
        }
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn task_queue(&self) -> &str {
        &self.task_queue
    }

    /// Advance one workflow. Returns `false` when the commit lost a race with
    /// new history and the task must be retried.
    pub async fn process_workflow_task(
        &self,
        task: WorkflowTask,
        now: DateTime<Utc>,
    ) -> Result<bool, JournalError> {
        let commands = match AgentWorkflow::replay(task.history.iter().map(|e| &e.event)) {
            Ok((_, commands)) => commands,
            Err(e) => {
                error!(
                    workflow_id = %task.workflow_id,
                    workflow_type = %task.workflow_type,
                    error = %e,
                    "Workflow history cannot be replayed, closing workflow"
                );
                vec![Command::CompleteWorkflow {
                    output: WorkflowOutput::failure(e.to_string()),
                }]
            }
        };

        match self
            .journal
            .complete_workflow_task(&task, &commands, &self.identity, now)
            .await
        {
            Ok(()) => {
                metrics::counter!("hyyve_workflow_tasks_total").increment(1);
                for command in &commands {
                    match command {
                        Command::ScheduleActivity { request, .. } => debug!(
                            workflow_id = %task.workflow_id,
                            activity = request.name(),
                            "Activity scheduled"
                        ),
                        Command::StartTimer { duration_secs, .. } => info!(
                            workflow_id = %task.workflow_id,
                            timeout_secs = duration_secs,
                            "Waiting for HITL approval"
                        ),
                        Command::CancelTimer { .. } => {}
                        Command::CompleteWorkflow { output } => {
                            metrics::counter!(
                                "hyyve_workflows_completed_total",
                                "success" => if output.success { "true" } else { "false" }
                            )
                            .increment(1);
                            info!(
                                workflow_id = %task.workflow_id,
                                success = output.success,
                                error = output.error.as_deref().unwrap_or(""),
                                "Workflow completed"
                            );
                        }
                    }
                }
                Ok(true)
            }
            Err(JournalError::Conflict { .. }) => {
                debug!(workflow_id = %task.workflow_id, "History moved during workflow task, retrying");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Run everything runnable at `now`: due timers, workflow tasks and
    /// visible activity attempts, repeated until a pass makes no progress.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport, JournalError> {
        let mut report = TickReport::default();
        loop {
            let mut progressed = false;

            let fired = self.journal.fire_due_timers(&self.task_queue, now).await?;
            report.timers_fired += fired;
            progressed |= fired > 0;

            while let Some(task) = self
                .journal
                .poll_workflow_task(&self.task_queue, self.config.workflow_task_lease, now)
                .await?
            {
                self.process_workflow_task(task, now).await?;
                report.workflow_tasks += 1;
                progressed = true;
            }

            while let Some(task) = self
                .journal
                .poll_activity_task(&self.task_queue, self.config.activity_task_lease(), now)
                .await?
            {
                self.executor.execute(&task, now).await?;
                report.activity_attempts += 1;
                progressed = true;
            }

            if !progressed {
                return Ok(report);
            }
        }
    }

    /// Poll until `shutdown` is cancelled, then drain in-flight activities and
    /// close the journal.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        info!(
            identity = %self.identity,
            task_queue = %self.task_queue,
            workflow = AGENT_WORKFLOW_TYPE,
            activities = ?AGENT_ACTIVITY_NAMES,
            "Worker started"
        );

        let mut in_flight: JoinSet<()> = JoinSet::new();
        let mut consecutive_failures = 0u32;
        let mut failure: Option<JournalError> = None;
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(in_flight = in_flight.len(), "Shutdown signal received, stopping worker");
                    break;
                }
                _ = interval.tick() => {}
            }

            while let Some(joined) = in_flight.try_join_next() {
                if let Err(e) = joined {
                    error!(error = %e, "Activity task panicked");
                }
            }

            match self.poll_once(&mut in_flight).await {
                Ok(()) => consecutive_failures = 0,
                Err(e) => {
                    consecutive_failures += 1;
                    warn!(error = %e, consecutive_failures, "Worker poll cycle failed");
                    if consecutive_failures >= self.config.max_consecutive_poll_failures {
                        error!(
                            consecutive_failures,
                            "Journal unreachable, stopping worker"
                        );
                        failure = Some(e);
                        break;
                    }
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Activity task panicked");
            }
        }
        self.journal.close().await;

        if let Some(e) = failure {
            return Err(anyhow::Error::from(e).context(format!(
                "Worker gave up after {} consecutive failed poll cycles",
                consecutive_failures
            )));
        }
        info!("Worker stopped");
        Ok(())
    }

    async fn poll_once(&self, in_flight: &mut JoinSet<()>) -> Result<(), JournalError> {
        let fired = self
            .journal
            .fire_due_timers(&self.task_queue, Utc::now())
            .await?;
        if fired > 0 {
            debug!(fired, "Timers fired");
        }

        while let Some(task) = self
            .journal
            .poll_workflow_task(&self.task_queue, self.config.workflow_task_lease, Utc::now())
            .await?
        {
            self.process_workflow_task(task, Utc::now()).await?;
        }

        while in_flight.len() < self.config.max_concurrent_activities {
            let Some(task) = self
                .journal
                .poll_activity_task(&self.task_queue, self.config.activity_task_lease(), Utc::now())
                .await?
            else {
                break;
            };

            let executor = self.executor.clone();
            in_flight.spawn(async move {
                let result = executor.attempt(&task).await;
                if let Err(e) = executor.record(&task, result, Utc::now()).await {
                    // The lease expires and another attempt picks the task up.
                    warn!(
                        workflow_id = %task.workflow_id,
                        activity = task.request.name(),
                        error = %e,
                        "Failed to record activity outcome"
                    );
                }
            });
        }
        Ok(())
    }
}
