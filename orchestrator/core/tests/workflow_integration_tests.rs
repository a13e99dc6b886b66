// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the agent workflow running on a worker
//!
//! These tests drive the full pipeline against the in-memory journal:
//! 1. Start a workflow instance
//! 2. Tick the worker at chosen instants (timers and retry backoff included)
//! 3. Deliver signals between ticks
//! 4. Verify the stored output and the recorded history

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use hyyve_core::application::worker::Worker;
use hyyve_core::domain::activity::{ActivityError, AgentActivities};
use hyyve_core::domain::history::{HistoryEvent, WorkflowId};
use hyyve_core::domain::journal::{SignalDelivery, WorkflowJournal};
use hyyve_core::domain::signal::{HitlApprovalPayload, WorkflowSignal};
use hyyve_core::domain::task::{
    AgentResponse, FetchResponseRequest, HitlDecisionRequest, HitlDecisionResponse, TaskInput,
    TaskStatus, TaskSubmission,
};
use hyyve_core::domain::workflow::{WorkflowOutput, WorkflowStatus, AGENT_WORKFLOW_TYPE};
use hyyve_core::infrastructure::config::WorkerConfig;
use hyyve_core::infrastructure::journal::InMemoryJournal;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

const QUEUE: &str = "hyyve-agent-tasks";

/// Agent Service double that replays scripted answers and records calls.
#[derive(Default)]
struct ScriptedAgent {
    submissions: Mutex<VecDeque<Result<TaskSubmission, ActivityError>>>,
    responses: Mutex<VecDeque<Result<AgentResponse, ActivityError>>>,
    decisions: Mutex<VecDeque<Result<HitlDecisionResponse, ActivityError>>>,
    submit_calls: Mutex<Vec<TaskInput>>,
    fetch_calls: Mutex<Vec<FetchResponseRequest>>,
    hitl_calls: Mutex<Vec<HitlDecisionRequest>>,
}

impl ScriptedAgent {
    fn submits(self, result: Result<TaskSubmission, ActivityError>) -> Self {
        self.submissions.lock().unwrap().push_back(result);
        self
    }

    fn responds(self, result: Result<AgentResponse, ActivityError>) -> Self {
        self.responses.lock().unwrap().push_back(result);
        self
    }

    fn decides(self, result: Result<HitlDecisionResponse, ActivityError>) -> Self {
        self.decisions.lock().unwrap().push_back(result);
        self
    }

    fn submit_count(&self) -> usize {
        self.submit_calls.lock().unwrap().len()
    }

    fn fetch_count(&self) -> usize {
        self.fetch_calls.lock().unwrap().len()
    }

    fn hitl_requests(&self) -> Vec<HitlDecisionRequest> {
        self.hitl_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentActivities for ScriptedAgent {
    async fn submit_task(&self, input: &TaskInput) -> Result<TaskSubmission, ActivityError> {
        self.submit_calls.lock().unwrap().push(input.clone());
        self.submissions
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected submit_task call")
    }

    async fn fetch_response(
        &self,
        request: &FetchResponseRequest,
    ) -> Result<AgentResponse, ActivityError> {
        self.fetch_calls.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected fetch_response call")
    }

    async fn submit_hitl_decision(
        &self,
        request: &HitlDecisionRequest,
    ) -> Result<HitlDecisionResponse, ActivityError> {
        self.hitl_calls.lock().unwrap().push(request.clone());
        self.decisions
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected submit_hitl_decision call")
    }
}

fn submitted(task_id: &str) -> TaskSubmission {
    TaskSubmission {
        task_id: task_id.to_string(),
        status: TaskStatus::Completed,
        requires_hitl: false,
        hitl_prompt: None,
    }
}

fn paused(task_id: &str, prompt: &str) -> TaskSubmission {
    TaskSubmission {
        task_id: task_id.to_string(),
        status: TaskStatus::RequiresHitl,
        requires_hitl: true,
        hitl_prompt: Some(prompt.to_string()),
    }
}

fn content(text: &str) -> AgentResponse {
    AgentResponse {
        content: text.to_string(),
        metadata: None,
    }
}

fn decision(text: &str) -> HitlDecisionResponse {
    HitlDecisionResponse {
        response: text.to_string(),
        metadata: None,
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

fn at(secs: i64) -> DateTime<Utc> {
    t0() + ChronoDuration::seconds(secs)
}

struct Harness {
    journal: Arc<InMemoryJournal>,
    agent: Arc<ScriptedAgent>,
    worker: Worker,
    workflow_id: WorkflowId,
}

impl Harness {
    async fn start(agent: ScriptedAgent) -> Self {
        let journal = Arc::new(InMemoryJournal::new());
        let agent = Arc::new(agent);
        let worker = Worker::new(journal.clone(), agent.clone(), QUEUE, WorkerConfig::default())
            .with_identity("worker-a");

        let workflow_id = WorkflowId::new("agent-bond-1");
        journal
            .start_workflow(
                &workflow_id,
                AGENT_WORKFLOW_TYPE,
                QUEUE,
                &TaskInput::new("bond", "s1", "hi"),
                t0(),
            )
            .await
            .unwrap();

        Self {
            journal,
            agent,
            worker,
            workflow_id,
        }
    }

    async fn signal(&self, signal: WorkflowSignal, now: DateTime<Utc>) -> SignalDelivery {
        self.journal
            .signal_workflow(&self.workflow_id, &signal, now)
            .await
            .unwrap()
    }

    async fn output(&self) -> Option<WorkflowOutput> {
        let description = self
            .journal
            .describe_workflow(&self.workflow_id)
            .await
            .unwrap()
            .unwrap();
        match description.status {
            WorkflowStatus::Completed => description.output,
            WorkflowStatus::Running => None,
        }
    }

    async fn events(&self) -> Vec<HistoryEvent> {
        self.journal
            .history(&self.workflow_id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.event)
            .collect()
    }

    async fn timer_started(&self) -> bool {
        self.events()
            .await
            .iter()
            .any(|e| matches!(e, HistoryEvent::TimerStarted { .. }))
    }
}

#[tokio::test]
async fn test_scenario_without_hitl_returns_agent_content() {
    let h = Harness::start(
        ScriptedAgent::default()
            .submits(Ok(submitted("t1")))
            .responds(Ok(content("hello back"))),
    )
    .await;

    h.worker.tick(t0()).await.unwrap();

    assert_eq!(h.output().await, Some(WorkflowOutput::success("hello back")));
    assert_eq!(h.agent.submit_count(), 1);
    let fetches = h.agent.fetch_calls.lock().unwrap().clone();
    assert_eq!(
        fetches,
        vec![FetchResponseRequest {
            agent_id: "bond".to_string(),
            session_id: "s1".to_string(),
            task_id: "t1".to_string(),
        }]
    );

    let serialized = serde_json::to_value(h.output().await.unwrap()).unwrap();
    assert_eq!(
        serialized,
        serde_json::json!({"success": true, "response": "hello back"})
    );
}

#[tokio::test]
async fn test_retryable_failures_back_off_then_succeed() {
    let mut agent = ScriptedAgent::default().submits(Ok(submitted("t1")));
    for _ in 0..4 {
        agent = agent.responds(Err(ActivityError::retryable(
            "Failed to get agent response: 503 - busy",
            "AGENT_RESPONSE_ERROR",
        )));
    }
    let h = Harness::start(agent.responds(Ok(content("hello back")))).await;

    h.worker.tick(t0()).await.unwrap();
    assert_eq!(h.agent.fetch_count(), 1);

    // Attempts become visible 1, 2, 4 and 8 seconds after each failure.
    for (now, expected_calls) in [(1, 2), (3, 3), (7, 4), (15, 5)] {
        let early = h.worker.tick(at(now) - ChronoDuration::milliseconds(1)).await.unwrap();
        assert!(early.is_idle(), "attempt ran before its backoff at {}s", now);
        h.worker.tick(at(now)).await.unwrap();
        assert_eq!(h.agent.fetch_count(), expected_calls);
    }

    assert_eq!(h.output().await, Some(WorkflowOutput::success("hello back")));
}

#[tokio::test]
async fn test_exhausted_retries_fail_the_workflow() {
    let mut agent = ScriptedAgent::default().submits(Ok(submitted("t1")));
    for _ in 0..5 {
        agent = agent.responds(Err(ActivityError::retryable(
            "Failed to get agent response: 503 - busy",
            "AGENT_RESPONSE_ERROR",
        )));
    }
    let h = Harness::start(agent).await;

    for now in [0, 1, 3, 7, 15] {
        h.worker.tick(at(now)).await.unwrap();
    }

    assert_eq!(h.agent.fetch_count(), 5);
    assert_eq!(
        h.output().await,
        Some(WorkflowOutput::failure("Failed to get agent response: 503 - busy"))
    );
}

#[tokio::test]
async fn test_non_retryable_submission_is_called_once() {
    let h = Harness::start(ScriptedAgent::default().submits(Err(ActivityError::non_retryable(
        "Agent service error: 400 - unknown agent",
        "AGENT_SERVICE_ERROR",
    ))))
    .await;

    h.worker.tick(t0()).await.unwrap();
    h.worker.tick(at(60)).await.unwrap();

    assert_eq!(h.agent.submit_count(), 1);
    assert_eq!(
        h.output().await,
        Some(WorkflowOutput::failure("Agent service error: 400 - unknown agent"))
    );
}

#[tokio::test]
async fn test_hitl_approval_resumes_with_feedback() {
    let h = Harness::start(
        ScriptedAgent::default()
            .submits(Ok(paused("t9", "Approve wire transfer?")))
            .decides(Ok(decision("transfer sent"))),
    )
    .await;

    h.worker.tick(t0()).await.unwrap();
    assert_eq!(h.output().await, None);
    assert!(h.timer_started().await);

    // Hours later a reviewer approves.
    let delivery = h
        .signal(
            WorkflowSignal::HitlApproval(HitlApprovalPayload::approve(Some("go".to_string()))),
            at(3 * 3600),
        )
        .await;
    assert_eq!(delivery, SignalDelivery::Delivered);
    h.worker.tick(at(3 * 3600)).await.unwrap();

    assert_eq!(
        h.agent.hitl_requests(),
        vec![HitlDecisionRequest {
            agent_id: "bond".to_string(),
            session_id: "s1".to_string(),
            task_id: "t9".to_string(),
            feedback: Some("go".to_string()),
        }]
    );
    assert_eq!(h.output().await, Some(WorkflowOutput::success("transfer sent")));
    assert!(h
        .events()
        .await
        .iter()
        .any(|e| matches!(e, HistoryEvent::TimerCancelled { .. })));

    // The cancelled timer never fires.
    assert_eq!(h.worker.tick(at(25 * 3600)).await.unwrap().timers_fired, 0);
}

#[tokio::test]
async fn test_hitl_denial_skips_the_agent() {
    let h = Harness::start(
        ScriptedAgent::default().submits(Ok(paused("t9", "Approve wire transfer?"))),
    )
    .await;

    h.worker.tick(t0()).await.unwrap();
    h.signal(
        WorkflowSignal::HitlApproval(HitlApprovalPayload::deny(Some("too risky".to_string()))),
        at(60),
    )
    .await;
    h.worker.tick(at(60)).await.unwrap();

    assert!(h.agent.hitl_requests().is_empty());
    let output = h.output().await.unwrap();
    assert!(!output.success);
    assert_eq!(output.error.as_deref(), Some("HITL approval denied"));
    assert_eq!(output.requires_hitl, Some(true));
}

#[tokio::test]
async fn test_hitl_wait_times_out_after_24_hours() {
    let h = Harness::start(
        ScriptedAgent::default().submits(Ok(paused("t9", "Approve wire transfer?"))),
    )
    .await;

    h.worker.tick(t0()).await.unwrap();
    h.worker.tick(at(24 * 3600 - 1)).await.unwrap();
    assert_eq!(h.output().await, None);

    let report = h.worker.tick(at(24 * 3600)).await.unwrap();
    assert_eq!(report.timers_fired, 1);
    assert_eq!(
        h.output().await,
        Some(
            WorkflowOutput::failure("HITL approval timeout")
                .with_hitl(Some("Approve wire transfer?".to_string()))
        )
    );
}

#[tokio::test]
async fn test_cancel_wins_over_approval_in_either_order() {
    let approval =
        || WorkflowSignal::HitlApproval(HitlApprovalPayload::approve(Some("go".to_string())));

    for cancel_first in [true, false] {
        let h = Harness::start(
            ScriptedAgent::default().submits(Ok(paused("t9", "Approve wire transfer?"))),
        )
        .await;
        h.worker.tick(t0()).await.unwrap();

        if cancel_first {
            h.signal(WorkflowSignal::CancelWorkflow, at(10)).await;
            h.signal(approval(), at(10)).await;
        } else {
            h.signal(approval(), at(10)).await;
            h.signal(WorkflowSignal::CancelWorkflow, at(10)).await;
        }
        h.worker.tick(at(10)).await.unwrap();

        assert!(h.agent.hitl_requests().is_empty());
        assert_eq!(
            h.output().await,
            Some(
                WorkflowOutput::failure("Workflow cancelled by user")
                    .with_hitl(Some("Approve wire transfer?".to_string()))
            ),
            "cancel_first = {}",
            cancel_first
        );
    }
}

#[tokio::test]
async fn test_cancel_during_submission_stops_after_submit() {
    let h = Harness::start(ScriptedAgent::default().submits(Ok(submitted("t1")))).await;

    h.signal(WorkflowSignal::CancelWorkflow, t0()).await;
    h.worker.tick(t0()).await.unwrap();

    assert_eq!(h.agent.submit_count(), 1);
    assert_eq!(h.agent.fetch_count(), 0);
    assert_eq!(
        h.output().await,
        Some(WorkflowOutput::failure("Workflow cancelled by user"))
    );
}

#[tokio::test]
async fn test_approval_before_wait_arms_no_timer() {
    let h = Harness::start(
        ScriptedAgent::default()
            .submits(Ok(paused("t9", "Approve wire transfer?")))
            .decides(Ok(decision("transfer sent"))),
    )
    .await;

    h.signal(
        WorkflowSignal::HitlApproval(HitlApprovalPayload::approve(None)),
        t0(),
    )
    .await;
    h.worker.tick(t0()).await.unwrap();

    assert!(!h.timer_started().await);
    assert_eq!(h.agent.hitl_requests()[0].feedback, None);
    assert_eq!(h.output().await, Some(WorkflowOutput::success("transfer sent")));
}

#[tokio::test]
async fn test_last_approval_wins() {
    let h = Harness::start(
        ScriptedAgent::default().submits(Ok(paused("t9", "Approve wire transfer?"))),
    )
    .await;
    h.worker.tick(t0()).await.unwrap();

    h.signal(
        WorkflowSignal::HitlApproval(HitlApprovalPayload::approve(None)),
        at(5),
    )
    .await;
    h.signal(
        WorkflowSignal::HitlApproval(HitlApprovalPayload::deny(None)),
        at(5),
    )
    .await;
    h.worker.tick(at(5)).await.unwrap();

    assert_eq!(
        h.output().await.and_then(|o| o.error),
        Some("HITL approval denied".to_string())
    );
}

#[tokio::test]
async fn test_signals_after_completion_are_ignored() {
    let h = Harness::start(
        ScriptedAgent::default()
            .submits(Ok(submitted("t1")))
            .responds(Ok(content("hello back"))),
    )
    .await;
    h.worker.tick(t0()).await.unwrap();
    let history_len = h.events().await.len();

    let cancel = h.signal(WorkflowSignal::CancelWorkflow, at(1)).await;
    let approve = h
        .signal(
            WorkflowSignal::HitlApproval(HitlApprovalPayload::approve(None)),
            at(1),
        )
        .await;

    assert_eq!(cancel, SignalDelivery::Ignored);
    assert_eq!(approve, SignalDelivery::Ignored);
    assert_eq!(h.events().await.len(), history_len);
    assert!(h.worker.tick(at(1)).await.unwrap().is_idle());
    assert_eq!(h.output().await, Some(WorkflowOutput::success("hello back")));
}

#[tokio::test]
async fn test_replacement_worker_resumes_hitl_wait() {
    let h = Harness::start(
        ScriptedAgent::default()
            .submits(Ok(paused("t9", "Approve wire transfer?")))
            .decides(Ok(decision("transfer sent"))),
    )
    .await;
    h.worker.tick(t0()).await.unwrap();

    // The first worker goes away; a new one rebuilds state from history.
    let Harness {
        journal,
        agent,
        worker,
        workflow_id,
    } = h;
    drop(worker);
    let replacement = Worker::new(journal.clone(), agent.clone(), QUEUE, WorkerConfig::default())
        .with_identity("worker-b");

    journal
        .signal_workflow(
            &workflow_id,
            &WorkflowSignal::HitlApproval(HitlApprovalPayload::approve(None)),
            at(7200),
        )
        .await
        .unwrap();
    replacement.tick(at(7200)).await.unwrap();

    let description = journal.describe_workflow(&workflow_id).await.unwrap().unwrap();
    assert_eq!(description.status, WorkflowStatus::Completed);
    assert_eq!(description.output, Some(WorkflowOutput::success("transfer sent")));
    assert_eq!(agent.submit_count(), 1);

    let identities: Vec<String> = journal
        .history(&workflow_id)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|e| match e.event {
            HistoryEvent::WorkflowTaskCompleted { identity } => Some(identity),
            _ => None,
        })
        .collect();
    assert!(identities.contains(&"worker-a".to_string()));
    assert_eq!(identities.last().map(String::as_str), Some("worker-b"));
}

#[tokio::test]
async fn test_unreplayable_history_closes_workflow() {
    let journal = Arc::new(InMemoryJournal::new());
    let worker = Worker::new(
        journal.clone(),
        Arc::new(ScriptedAgent::default()),
        QUEUE,
        WorkerConfig::default(),
    );
    let workflow_id = WorkflowId::new("legacy-1");
    journal
        .start_workflow(
            &workflow_id,
            "legacyWorkflow",
            QUEUE,
            &TaskInput::new("bond", "s1", "hi"),
            t0(),
        )
        .await
        .unwrap();

    worker.tick(t0()).await.unwrap();

    let description = journal.describe_workflow(&workflow_id).await.unwrap().unwrap();
    assert_eq!(description.status, WorkflowStatus::Completed);
    assert_eq!(
        description.output,
        Some(WorkflowOutput::failure("Unknown workflow type: legacyWorkflow"))
    );
}
