// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Agent Service HTTP Client
//!
//! Implements [`AgentActivities`] against the Agent Service REST API.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** HTTP calls behind the three agent activities
//! - **Integration:** Worker activity executor → Agent Service
//!
//! # Routes
//!
//! | Activity | Request |
//! |----------|---------|
//! | `executeAgentTask` | `POST /api/v1/agents/execute` |
//! | `getAgentResponse` | `GET /api/v1/agents/{agentId}/tasks/{taskId}/response` |
//! | `processHITLApproval` | `POST /api/v1/agents/{agentId}/tasks/{taskId}/hitl-approval` |
//!
//! # Failure classification
//!
//! Any answer to a submission is final: a non-2xx status means the service
//! refused the task, and an undecodable 2xx body means it may already have
//! accepted it. Non-2xx answers to the other two calls, transport errors and
//! their undecodable bodies are retryable.

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::domain::activity::{ActivityError, AgentActivities};
use crate::domain::task::{
    AgentResponse, FetchResponseRequest, HitlDecisionRequest, HitlDecisionResponse, TaskInput,
    TaskStatus, TaskSubmission,
};
use crate::infrastructure::config::AgentServiceConfig;

pub const AGENT_SERVICE_ERROR: &str = "AGENT_SERVICE_ERROR";
pub const AGENT_RESPONSE_ERROR: &str = "AGENT_RESPONSE_ERROR";
pub const HITL_APPROVAL_ERROR: &str = "HITL_APPROVAL_ERROR";
pub const INVALID_INPUT: &str = "INVALID_INPUT";
pub const TRANSPORT_ERROR: &str = "TRANSPORT_ERROR";
pub const DECODE_ERROR: &str = "DECODE_ERROR";

const SESSION_HEADER: &str = "X-Session-Id";

/// RFC 3986 unreserved characters stay as they are.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Serialize)]
struct ExecuteTaskBody<'a> {
    agent_id: &'a str,
    session_id: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a HashMap<String, serde_json::Value>>,
}

#[derive(Deserialize)]
struct ExecuteTaskReply {
    task_id: String,
    status: TaskStatus,
    #[serde(default)]
    requires_hitl: Option<bool>,
    #[serde(default)]
    hitl_prompt: Option<String>,
}

#[derive(Serialize)]
struct HitlApprovalBody<'a> {
    approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    feedback: Option<&'a str>,
}

#[derive(Clone)]
pub struct AgentServiceClient {
    http_client: HttpClient,
    base_url: String,
}

impl AgentServiceClient {
    pub fn new(config: &AgentServiceConfig) -> anyhow::Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn task_url(&self, agent_id: &str, task_id: &str, leaf: &str) -> String {
        format!(
            "{}/api/v1/agents/{}/tasks/{}/{}",
            self.base_url,
            utf8_percent_encode(agent_id, PATH_SEGMENT),
            utf8_percent_encode(task_id, PATH_SEGMENT),
            leaf
        )
    }
}

fn transport_error(e: reqwest::Error) -> ActivityError {
    warn!(error = %e, "Agent Service request failed");
    ActivityError::retryable(format!("Agent Service request failed: {}", e), TRANSPORT_ERROR)
}

fn decode_error(e: reqwest::Error) -> ActivityError {
    ActivityError::retryable(
        format!("Invalid Agent Service response body: {}", e),
        DECODE_ERROR,
    )
}

/// Read the status and body of a failed response.
async fn failure_parts(response: reqwest::Response) -> (u16, String) {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    (status, body)
}

#[async_trait]
impl AgentActivities for AgentServiceClient {
    async fn submit_task(&self, input: &TaskInput) -> Result<TaskSubmission, ActivityError> {
        input
            .validate()
            .map_err(|e| ActivityError::non_retryable(e.to_string(), INVALID_INPUT))?;

        let url = format!("{}/api/v1/agents/execute", self.base_url);
        debug!(agent_id = %input.agent_id, session_id = %input.session_id, "Submitting agent task");

        let response = self
            .http_client
            .post(&url)
            .json(&ExecuteTaskBody {
                agent_id: &input.agent_id,
                session_id: &input.session_id,
                message: &input.message,
                context: input.context.as_ref(),
            })
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let (status, body) = failure_parts(response).await;
            return Err(ActivityError::non_retryable(
                format!("Agent service error: {} - {}", status, body),
                AGENT_SERVICE_ERROR,
            ));
        }

        // The service accepted the task; submitting again would duplicate it.
        let reply: ExecuteTaskReply = response.json().await.map_err(|e| {
            ActivityError::non_retryable(
                format!("Invalid Agent Service response body: {}", e),
                DECODE_ERROR,
            )
        })?;
        Ok(TaskSubmission {
            task_id: reply.task_id,
            status: reply.status,
            requires_hitl: reply.requires_hitl.unwrap_or(false),
            hitl_prompt: reply.hitl_prompt,
        })
    }

    async fn fetch_response(
        &self,
        request: &FetchResponseRequest,
    ) -> Result<AgentResponse, ActivityError> {
        let url = self.task_url(&request.agent_id, &request.task_id, "response");
        debug!(task_id = %request.task_id, "Fetching agent response");

        let response = self
            .http_client
            .get(&url)
            .header(SESSION_HEADER, &request.session_id)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let (status, body) = failure_parts(response).await;
            return Err(ActivityError::retryable(
                format!("Failed to get agent response: {} - {}", status, body),
                AGENT_RESPONSE_ERROR,
            ));
        }

        response.json().await.map_err(decode_error)
    }

    async fn submit_hitl_decision(
        &self,
        request: &HitlDecisionRequest,
    ) -> Result<HitlDecisionResponse, ActivityError> {
        let url = self.task_url(&request.agent_id, &request.task_id, "hitl-approval");
        debug!(task_id = %request.task_id, "Forwarding HITL approval");

        let response = self
            .http_client
            .post(&url)
            .header(SESSION_HEADER, &request.session_id)
            .json(&HitlApprovalBody {
                approved: true,
                feedback: request.feedback.as_deref(),
            })
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let (status, body) = failure_parts(response).await;
            return Err(ActivityError::retryable(
                format!("Failed to process HITL approval: {} - {}", status, body),
                HITL_APPROVAL_ERROR,
            ));
        }

        response.json().await.map_err(decode_error)
    }
}
