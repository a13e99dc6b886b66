// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory workflow journal
//!
//! Single-process implementation of [`WorkflowJournal`] used by tests and
//! local development. It honours the same leasing, conflict and timer rules
//! as the PostgreSQL journal but loses everything when the process exits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::domain::activity::{ActivityFailure, ActivityRequest, ActivityResult};
use crate::domain::history::{Command, CommandId, HistoryEvent, SequencedEvent, WorkflowId};
use crate::domain::journal::{
    chrono_offset, ActivityTask, JournalError, SignalDelivery, WorkflowDescription,
    WorkflowJournal, WorkflowTask,
};
use crate::domain::signal::WorkflowSignal;
use crate::domain::task::TaskInput;
use crate::domain::workflow::{WorkflowOutput, WorkflowStatus};

struct WorkflowRecord {
    workflow_type: String,
    task_queue: String,
    status: WorkflowStatus,
    output: Option<WorkflowOutput>,
    started_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    history: Vec<SequencedEvent>,
    needs_decision: bool,
    locked_until: Option<DateTime<Utc>>,
}

impl WorkflowRecord {
    fn head(&self) -> i64 {
        self.history.last().map(|e| e.seq).unwrap_or(0)
    }

    fn append(&mut self, event: HistoryEvent, now: DateTime<Utc>) {
        let seq = self.head() + 1;
        self.history.push(SequencedEvent {
            seq,
            recorded_at: now,
            event,
        });
    }

    fn is_running(&self) -> bool {
        self.status == WorkflowStatus::Running
    }
}

struct ActivityRecord {
    task_queue: String,
    request: ActivityRequest,
    attempt: u32,
    scheduled_at: DateTime<Utc>,
    visible_at: DateTime<Utc>,
    locked_until: Option<DateTime<Utc>>,
}

struct TimerRecord {
    task_queue: String,
    fire_at: DateTime<Utc>,
}

type TaskKey = (WorkflowId, CommandId);

#[derive(Default)]
struct JournalState {
    workflows: BTreeMap<WorkflowId, WorkflowRecord>,
    activities: BTreeMap<TaskKey, ActivityRecord>,
    timers: BTreeMap<TaskKey, TimerRecord>,
}

impl JournalState {
    fn drop_pending_work(&mut self, workflow_id: &WorkflowId) {
        self.activities.retain(|(id, _), _| id != workflow_id);
        self.timers.retain(|(id, _), _| id != workflow_id);
    }

    /// Append an activity outcome if `task` is still the current attempt.
    fn resolve_activity(
        &mut self,
        task: &ActivityTask,
        event: HistoryEvent,
        now: DateTime<Utc>,
    ) {
        let key = (task.workflow_id.clone(), task.activity_id);
        let current = self
            .activities
            .get(&key)
            .map(|a| a.attempt == task.attempt)
            .unwrap_or(false);
        if !current {
            debug!(
                workflow_id = %task.workflow_id,
                activity_id = task.activity_id,
                attempt = task.attempt,
                "Discarding outcome of stale activity attempt"
            );
            return;
        }
        self.activities.remove(&key);

        if let Some(record) = self.workflows.get_mut(&task.workflow_id) {
            if record.is_running() {
                record.append(event, now);
                record.needs_decision = true;
            }
        }
    }
}

fn lease_free(locked_until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    locked_until.map(|until| until <= now).unwrap_or(true)
}

#[derive(Clone, Default)]
pub struct InMemoryJournal {
    state: Arc<Mutex<JournalState>>,
}

impl InMemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowJournal for InMemoryJournal {
    async fn start_workflow(
        &self,
        workflow_id: &WorkflowId,
        workflow_type: &str,
        task_queue: &str,
        input: &TaskInput,
        now: DateTime<Utc>,
    ) -> Result<(), JournalError> {
        let mut state = self.state.lock();
        if state.workflows.contains_key(workflow_id) {
            return Err(JournalError::WorkflowAlreadyExists(workflow_id.clone()));
        }

        let mut record = WorkflowRecord {
            workflow_type: workflow_type.to_string(),
            task_queue: task_queue.to_string(),
            status: WorkflowStatus::Running,
            output: None,
            started_at: now,
            closed_at: None,
            history: Vec::new(),
            needs_decision: true,
            locked_until: None,
        };
        record.append(
            HistoryEvent::WorkflowStarted {
                workflow_type: workflow_type.to_string(),
                task_queue: task_queue.to_string(),
                input: input.clone(),
            },
            now,
        );
        state.workflows.insert(workflow_id.clone(), record);
        Ok(())
    }

    async fn signal_workflow(
        &self,
        workflow_id: &WorkflowId,
        signal: &WorkflowSignal,
        now: DateTime<Utc>,
    ) -> Result<SignalDelivery, JournalError> {
        let mut state = self.state.lock();
        let record = state
            .workflows
            .get_mut(workflow_id)
            .ok_or_else(|| JournalError::WorkflowNotFound(workflow_id.clone()))?;

        if !record.is_running() {
            return Ok(SignalDelivery::Ignored);
        }
        record.append(
            HistoryEvent::SignalReceived {
                signal: signal.clone(),
            },
            now,
        );
        record.needs_decision = true;
        Ok(SignalDelivery::Delivered)
    }

    async fn poll_workflow_task(
        &self,
        task_queue: &str,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<WorkflowTask>, JournalError> {
        let mut state = self.state.lock();
        let candidate = state
            .workflows
            .iter()
            .filter(|(_, r)| {
                r.task_queue == task_queue
                    && r.is_running()
                    && r.needs_decision
                    && lease_free(r.locked_until, now)
            })
            .min_by_key(|(_, r)| r.started_at)
            .map(|(id, _)| id.clone());

        let Some(workflow_id) = candidate else {
            return Ok(None);
        };
        let Some(record) = state.workflows.get_mut(&workflow_id) else {
            return Ok(None);
        };
        record.locked_until = Some(now + chrono_offset(lease));

        Ok(Some(WorkflowTask {
            workflow_id,
            workflow_type: record.workflow_type.clone(),
            history: record.history.clone(),
        }))
    }

    async fn complete_workflow_task(
        &self,
        task: &WorkflowTask,
        commands: &[Command],
        identity: &str,
        now: DateTime<Utc>,
    ) -> Result<(), JournalError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let record = state
            .workflows
            .get_mut(&task.workflow_id)
            .ok_or_else(|| JournalError::WorkflowNotFound(task.workflow_id.clone()))?;

        if record.head() != task.head() || !record.is_running() {
            record.locked_until = None;
            return Err(JournalError::Conflict {
                workflow_id: task.workflow_id.clone(),
                expected_head: task.head(),
            });
        }

        let mut completed = false;
        for command in commands {
            record.append(command.to_event(), now);
            match command {
                Command::ScheduleActivity {
                    activity_id,
                    request,
                } => {
                    state.activities.insert(
                        (task.workflow_id.clone(), *activity_id),
                        ActivityRecord {
                            task_queue: record.task_queue.clone(),
                            request: request.clone(),
                            attempt: 1,
                            scheduled_at: now,
                            visible_at: now,
                            locked_until: None,
                        },
                    );
                }
                Command::StartTimer {
                    timer_id,
                    duration_secs,
                } => {
                    state.timers.insert(
                        (task.workflow_id.clone(), *timer_id),
                        TimerRecord {
                            task_queue: record.task_queue.clone(),
                            fire_at: now + chrono_offset(Duration::from_secs(*duration_secs)),
                        },
                    );
                }
                Command::CancelTimer { timer_id } => {
                    state.timers.remove(&(task.workflow_id.clone(), *timer_id));
                }
                Command::CompleteWorkflow { output } => {
                    record.status = WorkflowStatus::Completed;
                    record.output = Some(output.clone());
                    record.closed_at = Some(now);
                    completed = true;
                }
            }
        }
        record.append(
            HistoryEvent::WorkflowTaskCompleted {
                identity: identity.to_string(),
            },
            now,
        );
        record.needs_decision = false;
        record.locked_until = None;

        if completed {
            state.drop_pending_work(&task.workflow_id);
        }
        Ok(())
    }

    async fn poll_activity_task(
        &self,
        task_queue: &str,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<ActivityTask>, JournalError> {
        let mut state = self.state.lock();
        let candidate = state
            .activities
            .iter()
            .filter(|(_, a)| {
                a.task_queue == task_queue && a.visible_at <= now && lease_free(a.locked_until, now)
            })
            .min_by_key(|(_, a)| a.visible_at)
            .map(|(key, _)| key.clone());

        let Some(key) = candidate else {
            return Ok(None);
        };
        let Some(activity) = state.activities.get_mut(&key) else {
            return Ok(None);
        };
        activity.locked_until = Some(now + chrono_offset(lease));

        Ok(Some(ActivityTask {
            workflow_id: key.0,
            activity_id: key.1,
            request: activity.request.clone(),
            attempt: activity.attempt,
            scheduled_at: activity.scheduled_at,
        }))
    }

    async fn complete_activity_task(
        &self,
        task: &ActivityTask,
        result: &ActivityResult,
        now: DateTime<Utc>,
    ) -> Result<(), JournalError> {
        let mut state = self.state.lock();
        state.resolve_activity(
            task,
            HistoryEvent::ActivityCompleted {
                activity_id: task.activity_id,
                result: result.clone(),
            },
            now,
        );
        Ok(())
    }

    async fn fail_activity_task(
        &self,
        task: &ActivityTask,
        failure: &ActivityFailure,
        now: DateTime<Utc>,
    ) -> Result<(), JournalError> {
        let mut state = self.state.lock();
        state.resolve_activity(
            task,
            HistoryEvent::ActivityFailed {
                activity_id: task.activity_id,
                failure: failure.clone(),
            },
            now,
        );
        Ok(())
    }

    async fn retry_activity_task(
        &self,
        task: &ActivityTask,
        delay: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), JournalError> {
        let mut state = self.state.lock();
        if let Some(activity) = state
            .activities
            .get_mut(&(task.workflow_id.clone(), task.activity_id))
            .filter(|a| a.attempt == task.attempt)
        {
            activity.attempt += 1;
            activity.visible_at = now + chrono_offset(delay);
            activity.locked_until = None;
        }
        Ok(())
    }

    async fn fire_due_timers(
        &self,
        task_queue: &str,
        now: DateTime<Utc>,
    ) -> Result<usize, JournalError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let due: Vec<TaskKey> = state
            .timers
            .iter()
            .filter(|(_, t)| t.task_queue == task_queue && t.fire_at <= now)
            .map(|(key, _)| key.clone())
            .collect();

        let mut fired = 0;
        for (workflow_id, timer_id) in due {
            state.timers.remove(&(workflow_id.clone(), timer_id));
            if let Some(record) = state.workflows.get_mut(&workflow_id) {
                if record.is_running() {
                    record.append(HistoryEvent::TimerFired { timer_id }, now);
                    record.needs_decision = true;
                    fired += 1;
                }
            }
        }
        Ok(fired)
    }

    async fn describe_workflow(
        &self,
        workflow_id: &WorkflowId,
    ) -> Result<Option<WorkflowDescription>, JournalError> {
        let state = self.state.lock();
        Ok(state.workflows.get(workflow_id).map(|r| WorkflowDescription {
            workflow_id: workflow_id.clone(),
            workflow_type: r.workflow_type.clone(),
            task_queue: r.task_queue.clone(),
            status: r.status,
            output: r.output.clone(),
            started_at: r.started_at,
            closed_at: r.closed_at,
        }))
    }

    async fn history(&self, workflow_id: &WorkflowId) -> Result<Vec<SequencedEvent>, JournalError> {
        let state = self.state.lock();
        state
            .workflows
            .get(workflow_id)
            .map(|r| r.history.clone())
            .ok_or_else(|| JournalError::WorkflowNotFound(workflow_id.clone()))
    }

    async fn close(&self) {}
}
