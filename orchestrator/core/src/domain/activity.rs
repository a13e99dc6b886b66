// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Activities
//!
//! The three remote operations the agent workflow schedules, expressed as a
//! trait so the worker can run them against the real Agent Service or against
//! a scripted double in tests.
//!
//! Every failure is classified at the source: [`ActivityError::NonRetryable`]
//! skips the retry policy entirely, everything else is retried with backoff.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Activity contracts, request/result envelopes, failure taxonomy
//! - **Integration:** Implemented by `infrastructure::agent_service_client`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::domain::task::{
    AgentResponse, FetchResponseRequest, HitlDecisionRequest, HitlDecisionResponse, TaskInput,
    TaskSubmission,
};

pub const EXECUTE_AGENT_TASK: &str = "executeAgentTask";
pub const GET_AGENT_RESPONSE: &str = "getAgentResponse";
pub const PROCESS_HITL_APPROVAL: &str = "processHITLApproval";

/// Activity names a worker registers against its task queue.
pub const AGENT_ACTIVITY_NAMES: [&str; 3] =
    [EXECUTE_AGENT_TASK, GET_AGENT_RESPONSE, PROCESS_HITL_APPROVAL];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActivityError {
    #[error("{message}")]
    NonRetryable { message: String, error_type: String },

    #[error("{message}")]
    Retryable { message: String, error_type: String },

    #[error("Activity attempt timed out after {0:?}")]
    Timeout(Duration),
}

impl ActivityError {
    pub fn non_retryable(message: impl Into<String>, error_type: impl Into<String>) -> Self {
        ActivityError::NonRetryable {
            message: message.into(),
            error_type: error_type.into(),
        }
    }

    pub fn retryable(message: impl Into<String>, error_type: impl Into<String>) -> Self {
        ActivityError::Retryable {
            message: message.into(),
            error_type: error_type.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, ActivityError::NonRetryable { .. })
    }

    pub fn error_type(&self) -> Option<&str> {
        match self {
            ActivityError::NonRetryable { error_type, .. }
            | ActivityError::Retryable { error_type, .. } => Some(error_type),
            ActivityError::Timeout(_) => None,
        }
    }
}

/// Terminal failure of an activity as recorded in workflow history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityFailure {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    pub non_retryable: bool,
    pub attempts: u32,
}

impl ActivityFailure {
    pub fn from_error(error: &ActivityError, attempts: u32) -> Self {
        Self {
            message: error.to_string(),
            error_type: error.error_type().map(str::to_string),
            non_retryable: !error.is_retryable(),
            attempts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "activity", content = "input")]
pub enum ActivityRequest {
    #[serde(rename = "executeAgentTask")]
    ExecuteAgentTask(TaskInput),
    #[serde(rename = "getAgentResponse")]
    GetAgentResponse(FetchResponseRequest),
    #[serde(rename = "processHITLApproval")]
    ProcessHitlApproval(HitlDecisionRequest),
}

impl ActivityRequest {
    pub fn name(&self) -> &'static str {
        match self {
            ActivityRequest::ExecuteAgentTask(_) => EXECUTE_AGENT_TASK,
            ActivityRequest::GetAgentResponse(_) => GET_AGENT_RESPONSE,
            ActivityRequest::ProcessHitlApproval(_) => PROCESS_HITL_APPROVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "activity", content = "output")]
pub enum ActivityResult {
    #[serde(rename = "executeAgentTask")]
    TaskSubmitted(TaskSubmission),
    #[serde(rename = "getAgentResponse")]
    ResponseFetched(AgentResponse),
    #[serde(rename = "processHITLApproval")]
    HitlDecisionProcessed(HitlDecisionResponse),
}

/// Remote operations against the Agent Service.
#[async_trait]
pub trait AgentActivities: Send + Sync {
    /// Submit a task. Rejections are non-retryable.
    async fn submit_task(&self, input: &TaskInput) -> Result<TaskSubmission, ActivityError>;

    /// Fetch the output of a finished task. Failures are retryable.
    async fn fetch_response(
        &self,
        request: &FetchResponseRequest,
    ) -> Result<AgentResponse, ActivityError>;

    /// Approve a paused task and let the agent continue. Failures are retryable.
    async fn submit_hitl_decision(
        &self,
        request: &HitlDecisionRequest,
    ) -> Result<HitlDecisionResponse, ActivityError>;

    /// Dispatch a scheduled request to the matching operation.
    async fn execute(&self, request: &ActivityRequest) -> Result<ActivityResult, ActivityError> {
        match request {
            ActivityRequest::ExecuteAgentTask(input) => {
                self.submit_task(input).await.map(ActivityResult::TaskSubmitted)
            }
            ActivityRequest::GetAgentResponse(req) => {
                self.fetch_response(req).await.map(ActivityResult::ResponseFetched)
            }
            ActivityRequest::ProcessHitlApproval(req) => self
                .submit_hitl_decision(req)
                .await
                .map(ActivityResult::HitlDecisionProcessed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_non_retryable_skips_retries() {
        assert!(!ActivityError::non_retryable("bad input", "AGENT_SERVICE_ERROR").is_retryable());
        assert!(ActivityError::retryable("503", "AGENT_RESPONSE_ERROR").is_retryable());
        assert!(ActivityError::Timeout(Duration::from_secs(300)).is_retryable());
    }

    #[test]
    fn test_failure_keeps_message_and_type() {
        let error = ActivityError::non_retryable(
            "Agent service error: 400 - bad agent",
            "AGENT_SERVICE_ERROR",
        );
        let failure = ActivityFailure::from_error(&error, 1);

        assert_eq!(failure.message, "Agent service error: 400 - bad agent");
        assert_eq!(failure.error_type.as_deref(), Some("AGENT_SERVICE_ERROR"));
        assert!(failure.non_retryable);
        assert_eq!(failure.attempts, 1);
    }

    #[test]
    fn test_request_names_match_registration() {
        let request = ActivityRequest::GetAgentResponse(FetchResponseRequest {
            agent_id: "bond".to_string(),
            session_id: "s1".to_string(),
            task_id: "t1".to_string(),
        });
        assert_eq!(request.name(), "getAgentResponse");
        assert!(AGENT_ACTIVITY_NAMES.contains(&request.name()));

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["activity"], "getAgentResponse");
        assert_eq!(value["input"]["taskId"], "t1");
    }
}
