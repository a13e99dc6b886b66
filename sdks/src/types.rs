// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Types
//!
//! Caller-facing values of the agent workflow contract.

pub use hyyve_core::domain::history::WorkflowId;
pub use hyyve_core::domain::journal::{SignalDelivery, WorkflowDescription};
pub use hyyve_core::domain::signal::{HitlApprovalPayload, SignalError, WorkflowSignal};
pub use hyyve_core::domain::task::TaskInput;
pub use hyyve_core::domain::workflow::{WorkflowOutput, WorkflowStatus};
pub use hyyve_core::infrastructure::config::OrchestratorConfig;
