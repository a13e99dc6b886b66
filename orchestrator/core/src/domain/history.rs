// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Workflow History (Event Sourcing)
//!
//! Every workflow instance is an append-only log of [`HistoryEvent`]s. The
//! workflow state machine never persists its own state: a worker rebuilds it
//! by replaying the log, which is what lets a 24 hour HITL wait survive any
//! number of worker restarts.
//!
//! Events come in three kinds:
//!
//! - **External** events arrive from outside the workflow body (start input,
//!   signals, activity outcomes, fired timers) and trigger a workflow task.
//! - **Command** events record what the body decided in response
//!   ([`Command`] ↔ event, one to one).
//! - The `WorkflowTaskCompleted` marker closes each decision batch.
//!
//! ```text
//! seq  event
//! 1    WorkflowStarted
//! 2    ActivityScheduled(1, executeAgentTask)   ┐ batch 1
//! 3    WorkflowTaskCompleted                    ┘
//! 4    ActivityCompleted(1)                     ┐
//! 5    TimerStarted(2, 24h)                     │ batch 2
//! 6    WorkflowTaskCompleted                    ┘
//! 7    SignalReceived(hitlApproval)             ┐
//! 8    TimerCancelled(2)                        │ batch 3
//! 9    ActivityScheduled(3, processHITLApproval)│
//! 10   WorkflowTaskCompleted                    ┘
//! ```
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Durable event model shared by the state machine and journals

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::activity::{ActivityFailure, ActivityRequest, ActivityResult};
use crate::domain::signal::WorkflowSignal;
use crate::domain::task::TaskInput;
use crate::domain::workflow::WorkflowOutput;

/// Caller-chosen identifier of a workflow instance, unique per namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Default id for an agent run: `agent-{agentId}-{epochMillis}`.
    pub fn for_agent(agent_id: &str, now: DateTime<Utc>) -> Self {
        Self(format!("agent-{}-{}", agent_id, now.timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies a scheduled activity or timer within one workflow instance.
/// Allocated by the state machine in scheduling order, so replay reproduces it.
pub type CommandId = u32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryEvent {
    WorkflowStarted {
        workflow_type: String,
        task_queue: String,
        input: TaskInput,
    },
    SignalReceived {
        signal: WorkflowSignal,
    },
    ActivityCompleted {
        activity_id: CommandId,
        result: ActivityResult,
    },
    ActivityFailed {
        activity_id: CommandId,
        failure: ActivityFailure,
    },
    TimerFired {
        timer_id: CommandId,
    },
    ActivityScheduled {
        activity_id: CommandId,
        request: ActivityRequest,
    },
    TimerStarted {
        timer_id: CommandId,
        duration_secs: u64,
    },
    TimerCancelled {
        timer_id: CommandId,
    },
    WorkflowCompleted {
        output: WorkflowOutput,
    },
    WorkflowTaskCompleted {
        identity: String,
    },
}

impl HistoryEvent {
    /// The command this event records, if it is a command event.
    pub fn as_command(&self) -> Option<Command> {
        match self {
            HistoryEvent::ActivityScheduled {
                activity_id,
                request,
            } => Some(Command::ScheduleActivity {
                activity_id: *activity_id,
                request: request.clone(),
            }),
            HistoryEvent::TimerStarted {
                timer_id,
                duration_secs,
            } => Some(Command::StartTimer {
                timer_id: *timer_id,
                duration_secs: *duration_secs,
            }),
            HistoryEvent::TimerCancelled { timer_id } => Some(Command::CancelTimer {
                timer_id: *timer_id,
            }),
            HistoryEvent::WorkflowCompleted { output } => Some(Command::CompleteWorkflow {
                output: output.clone(),
            }),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            HistoryEvent::WorkflowStarted { .. } => "workflow_started",
            HistoryEvent::SignalReceived { .. } => "signal_received",
            HistoryEvent::ActivityCompleted { .. } => "activity_completed",
            HistoryEvent::ActivityFailed { .. } => "activity_failed",
            HistoryEvent::TimerFired { .. } => "timer_fired",
            HistoryEvent::ActivityScheduled { .. } => "activity_scheduled",
            HistoryEvent::TimerStarted { .. } => "timer_started",
            HistoryEvent::TimerCancelled { .. } => "timer_cancelled",
            HistoryEvent::WorkflowCompleted { .. } => "workflow_completed",
            HistoryEvent::WorkflowTaskCompleted { .. } => "workflow_task_completed",
        }
    }
}

/// A decision of the workflow body, executed by the journal on commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    ScheduleActivity {
        activity_id: CommandId,
        request: ActivityRequest,
    },
    StartTimer {
        timer_id: CommandId,
        duration_secs: u64,
    },
    CancelTimer {
        timer_id: CommandId,
    },
    CompleteWorkflow {
        output: WorkflowOutput,
    },
}

impl Command {
    pub fn to_event(&self) -> HistoryEvent {
        match self {
            Command::ScheduleActivity {
                activity_id,
                request,
            } => HistoryEvent::ActivityScheduled {
                activity_id: *activity_id,
                request: request.clone(),
            },
            Command::StartTimer {
                timer_id,
                duration_secs,
            } => HistoryEvent::TimerStarted {
                timer_id: *timer_id,
                duration_secs: *duration_secs,
            },
            Command::CancelTimer { timer_id } => HistoryEvent::TimerCancelled {
                timer_id: *timer_id,
            },
            Command::CompleteWorkflow { output } => HistoryEvent::WorkflowCompleted {
                output: output.clone(),
            },
        }
    }
}

/// An event with its position in the log (starting at 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencedEvent {
    pub seq: i64,
    pub recorded_at: DateTime<Utc>,
    pub event: HistoryEvent,
}
