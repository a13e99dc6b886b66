// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Workflow signals
//!
//! Asynchronous inputs delivered to a running agent workflow. The signal names
//! are part of the caller contract and match what the dashboard sends.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const HITL_APPROVAL_SIGNAL: &str = "hitlApproval";
pub const CANCEL_WORKFLOW_SIGNAL: &str = "cancelWorkflow";

/// Human decision on a task that paused for approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitlApprovalPayload {
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl HitlApprovalPayload {
    pub fn approve(feedback: Option<String>) -> Self {
        Self {
            approved: true,
            feedback,
        }
    }

    pub fn deny(feedback: Option<String>) -> Self {
        Self {
            approved: false,
            feedback,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", content = "payload")]
pub enum WorkflowSignal {
    #[serde(rename = "hitlApproval")]
    HitlApproval(HitlApprovalPayload),
    #[serde(rename = "cancelWorkflow")]
    CancelWorkflow,
}

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("Unknown signal: {0}")]
    UnknownSignal(String),
    #[error("Signal {signal} requires a payload")]
    MissingPayload { signal: &'static str },
    #[error("Invalid payload for signal {signal}: {source}")]
    InvalidPayload {
        signal: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl WorkflowSignal {
    /// Build a signal from its wire name and optional JSON payload.
    pub fn from_parts(
        name: &str,
        payload: Option<serde_json::Value>,
    ) -> Result<Self, SignalError> {
        match name {
            HITL_APPROVAL_SIGNAL => {
                let payload = payload.ok_or(SignalError::MissingPayload {
                    signal: HITL_APPROVAL_SIGNAL,
                })?;
                let payload = serde_json::from_value(payload).map_err(|source| {
                    SignalError::InvalidPayload {
                        signal: HITL_APPROVAL_SIGNAL,
                        source,
                    }
                })?;
                Ok(WorkflowSignal::HitlApproval(payload))
            }
            CANCEL_WORKFLOW_SIGNAL => Ok(WorkflowSignal::CancelWorkflow),
            other => Err(SignalError::UnknownSignal(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WorkflowSignal::HitlApproval(_) => HITL_APPROVAL_SIGNAL,
            WorkflowSignal::CancelWorkflow => CANCEL_WORKFLOW_SIGNAL,
        }
    }
}
