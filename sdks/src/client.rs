// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::Utc;
use hyyve_core::domain::history::WorkflowId;
use hyyve_core::domain::journal::{
    JournalError, SignalDelivery, WorkflowDescription, WorkflowJournal,
};
use hyyve_core::domain::signal::{HitlApprovalPayload, SignalError, WorkflowSignal};
use hyyve_core::domain::task::{TaskInput, TaskInputError};
use hyyve_core::domain::workflow::{WorkflowOutput, WorkflowStatus, AGENT_WORKFLOW_TYPE};
use hyyve_core::infrastructure::config::OrchestratorConfig;
use hyyve_core::infrastructure::journal::PostgresJournal;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_RESULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid task input: {0}")]
    InvalidInput(#[from] TaskInputError),

    #[error(transparent)]
    InvalidSignal(#[from] SignalError),

    #[error("Workflow {0} not found")]
    NotFound(WorkflowId),

    #[error(transparent)]
    Journal(JournalError),
}

impl From<JournalError> for ClientError {
    fn from(e: JournalError) -> Self {
        match e {
            JournalError::WorkflowNotFound(id) => ClientError::NotFound(id),
            other => ClientError::Journal(other),
        }
    }
}

/// Client for starting and steering agent workflows.
#[derive(Clone)]
pub struct WorkflowClient {
    journal: Arc<dyn WorkflowJournal>,
    task_queue: String,
    poll_interval: Duration,
}

impl WorkflowClient {
    pub fn new(journal: Arc<dyn WorkflowJournal>, task_queue: impl Into<String>) -> Self {
        Self {
            journal,
            task_queue: task_queue.into(),
            poll_interval: DEFAULT_RESULT_POLL_INTERVAL,
        }
    }

    /// Connect to the orchestrator database named by `config`.
    pub async fn connect(config: &OrchestratorConfig) -> Result<Self, ClientError> {
        let journal = PostgresJournal::connect(
            &config.address,
            &config.namespace,
            config.worker.max_connections,
        )
        .await?;
        Ok(Self::new(Arc::new(journal), config.task_queue.clone()))
    }

    /// How often [`WorkflowHandle::result`] checks for completion.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Start an agent workflow. Without an explicit id the workflow is named
    /// `agent-{agentId}-{epochMillis}`.
    pub async fn start_agent_workflow(
        &self,
        input: TaskInput,
        workflow_id: Option<String>,
    ) -> Result<WorkflowHandle, ClientError> {
        input.validate()?;

        let now = Utc::now();
        let workflow_id = workflow_id
            .map(WorkflowId::new)
            .unwrap_or_else(|| WorkflowId::for_agent(&input.agent_id, now));

        self.journal
            .start_workflow(&workflow_id, AGENT_WORKFLOW_TYPE, &self.task_queue, &input, now)
            .await?;
        info!(
            workflow_id = %workflow_id,
            agent_id = %input.agent_id,
            task_queue = %self.task_queue,
            "Agent workflow started"
        );

        Ok(self.handle(workflow_id.0))
    }

    /// Handle to an existing workflow. Nothing is checked until it is used.
    pub fn handle(&self, workflow_id: impl Into<String>) -> WorkflowHandle {
        WorkflowHandle {
            journal: self.journal.clone(),
            workflow_id: WorkflowId::new(workflow_id),
            poll_interval: self.poll_interval,
        }
    }

    pub async fn close(&self) {
        self.journal.close().await;
    }
}

#[derive(Clone)]
pub struct WorkflowHandle {
    journal: Arc<dyn WorkflowJournal>,
    workflow_id: WorkflowId,
    poll_interval: Duration,
}

impl std::fmt::Debug for WorkflowHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowHandle")
            .field("workflow_id", &self.workflow_id)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl WorkflowHandle {
    pub fn workflow_id(&self) -> &WorkflowId {
        &self.workflow_id
    }

    /// Deliver a signal. A completed workflow ignores it and the call still
    /// succeeds.
    pub async fn signal(&self, signal: WorkflowSignal) -> Result<SignalDelivery, ClientError> {
        let delivery = self
            .journal
            .signal_workflow(&self.workflow_id, &signal, Utc::now())
            .await?;
        debug!(
            workflow_id = %self.workflow_id,
            signal = signal.name(),
            ?delivery,
            "Signal sent"
        );
        Ok(delivery)
    }

    /// Deliver a signal given by its wire name, e.g. `hitlApproval` with
    /// `{"approved": true}`.
    pub async fn signal_by_name(
        &self,
        name: &str,
        payload: Option<serde_json::Value>,
    ) -> Result<SignalDelivery, ClientError> {
        let signal = WorkflowSignal::from_parts(name, payload)?;
        self.signal(signal).await
    }

    pub async fn approve(&self, payload: HitlApprovalPayload) -> Result<SignalDelivery, ClientError> {
        self.signal(WorkflowSignal::HitlApproval(payload)).await
    }

    pub async fn cancel(&self) -> Result<SignalDelivery, ClientError> {
        self.signal(WorkflowSignal::CancelWorkflow).await
    }

    pub async fn describe(&self) -> Result<WorkflowDescription, ClientError> {
        self.journal
            .describe_workflow(&self.workflow_id)
            .await?
            .ok_or_else(|| ClientError::NotFound(self.workflow_id.clone()))
    }

    /// The output if the workflow has completed.
    pub async fn try_result(&self) -> Result<Option<WorkflowOutput>, ClientError> {
        let description = self.describe().await?;
        Ok(match description.status {
            WorkflowStatus::Completed => description.output,
            WorkflowStatus::Running => None,
        })
    }

    /// Wait until the workflow completes and return its output.
    pub async fn result(&self) -> Result<WorkflowOutput, ClientError> {
        loop {
            if let Some(output) = self.try_result().await? {
                return Ok(output);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
