// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Task Model
//!
//! Value objects exchanged between the agent workflow and the Agent Service.
//! Caller-facing payloads use camelCase field names; the snake_case wire
//! shapes of the Agent Service live in the HTTP client.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Task input, submission result and response value objects

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Input handed to a workflow instance exactly once, at start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    pub agent_id: String,
    pub session_id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskInputError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
}

impl TaskInput {
    pub fn new(
        agent_id: impl Into<String>,
        session_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            session_id: session_id.into(),
            message: message.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: HashMap<String, serde_json::Value>) -> Self {
        self.context = Some(context);
        self
    }

    /// Reject inputs the Agent Service can never accept.
    pub fn validate(&self) -> Result<(), TaskInputError> {
        if self.agent_id.trim().is_empty() {
            return Err(TaskInputError::EmptyField("agentId"));
        }
        if self.session_id.trim().is_empty() {
            return Err(TaskInputError::EmptyField("sessionId"));
        }
        if self.message.trim().is_empty() {
            return Err(TaskInputError::EmptyField("message"));
        }
        Ok(())
    }
}

/// Agent Service view of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    RequiresHitl,
    /// Any status this client does not know. Only `requires_hitl` drives the
    /// workflow, so the submission still succeeds.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::RequiresHitl => "requires_hitl",
            TaskStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Result of `executeAgentTask`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSubmission {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(rename = "requiresHITL")]
    pub requires_hitl: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hitl_prompt: Option<String>,
}

/// Input of `getAgentResponse`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResponseRequest {
    pub agent_id: String,
    pub session_id: String,
    pub task_id: String,
}

/// Result of `getAgentResponse`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// Input of `processHITLApproval`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HitlDecisionRequest {
    pub agent_id: String,
    pub session_id: String,
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

/// Result of `processHITLApproval`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitlDecisionResponse {
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_blank_fields() {
        assert!(TaskInput::new("bond", "s1", "hi").validate().is_ok());
        assert_eq!(
            TaskInput::new("", "s1", "hi").validate(),
            Err(TaskInputError::EmptyField("agentId"))
        );
        assert_eq!(
            TaskInput::new("bond", "  ", "hi").validate(),
            Err(TaskInputError::EmptyField("sessionId"))
        );
        assert_eq!(
            TaskInput::new("bond", "s1", "").validate(),
            Err(TaskInputError::EmptyField("message"))
        );
    }

    #[test]
    fn test_task_input_uses_camel_case() {
        let input: TaskInput = serde_json::from_value(serde_json::json!({
            "agentId": "bond",
            "sessionId": "s1",
            "message": "hi",
            "context": {"tier": "pro"}
        }))
        .unwrap();

        assert_eq!(input.agent_id, "bond");
        assert_eq!(input.context.unwrap()["tier"], "pro");
    }

    #[test]
    fn test_unrecognised_status_is_unknown() {
        let status: TaskStatus = serde_json::from_value(serde_json::json!("queued")).unwrap();
        assert_eq!(status, TaskStatus::Unknown);
        let status: TaskStatus = serde_json::from_value(serde_json::json!("pending")).unwrap();
        assert_eq!(status, TaskStatus::Pending);
    }

    #[test]
    fn test_submission_serializes_hitl_flag() {
        let submission = TaskSubmission {
            task_id: "t1".to_string(),
            status: TaskStatus::RequiresHitl,
            requires_hitl: true,
            hitl_prompt: Some("Ship it?".to_string()),
        };

        let value = serde_json::to_value(&submission).unwrap();
        assert_eq!(value["status"], "requires_hitl");
        assert_eq!(value["requiresHITL"], true);
        assert_eq!(value["hitlPrompt"], "Ship it?");
    }
}
