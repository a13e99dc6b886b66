// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Agent task model, workflow signals, the agent workflow state machine and
//! the durable journal contract it runs on.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure workflow semantics, free of I/O

pub mod activity;
pub mod history;
pub mod journal;
pub mod retry;
pub mod signal;
pub mod task;
pub mod workflow;

pub use activity::{
    ActivityError, ActivityFailure, ActivityRequest, ActivityResult, AgentActivities,
};
pub use history::{Command, CommandId, HistoryEvent, SequencedEvent, WorkflowId};
pub use journal::{
    ActivityTask, JournalError, SignalDelivery, WorkflowDescription, WorkflowJournal,
    WorkflowTask,
};
pub use retry::RetryPolicy;
pub use signal::{HitlApprovalPayload, WorkflowSignal};
pub use task::{
    AgentResponse, FetchResponseRequest, HitlDecisionRequest, HitlDecisionResponse, TaskInput,
    TaskStatus, TaskSubmission,
};
pub use workflow::{AgentWorkflow, ReplayError, WorkflowOutput, WorkflowPhase, WorkflowStatus};
