// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Hyyve Rust SDK
//!
//! Start agent workflows, send them `hitlApproval` / `cancelWorkflow`
//! signals and collect their output.
//!
//! ```ignore
//! use hyyve_sdk::{HitlApprovalPayload, TaskInput, WorkflowClient};
//!
//! let client = WorkflowClient::connect(&OrchestratorConfig::from_env()).await?;
//! let handle = client
//!     .start_agent_workflow(TaskInput::new("bond", "s1", "hi"), None)
//!     .await?;
//! handle.approve(HitlApprovalPayload::approve(None)).await?;
//! let output = handle.result().await?;
//! ```

pub mod client;
pub mod types;

pub use client::{ClientError, WorkflowClient, WorkflowHandle};
pub use types::*;
