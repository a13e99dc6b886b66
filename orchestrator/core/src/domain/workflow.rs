// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Execution Workflow
//!
//! Durable state machine that drives one agent task from submission to a
//! single terminal [`WorkflowOutput`]:
//!
//! ```text
//! Submitting ──┬── requiresHITL=false ──> FetchingResponse ──┐
//!              │                                             ├──> Done
//!              └── requiresHITL=true ──> AwaitingHitl ──> Resolving ──┘
//! ```
//!
//! The machine is rebuilt from history on every workflow task
//! ([`AgentWorkflow::replay`]). It is deterministic: the same history always
//! yields the same commands, and the commands recorded in history are checked
//! against what replay produces.
//!
//! ## Signals
//!
//! `hitlApproval` overwrites the pending approval (last write wins) and
//! `cancelWorkflow` raises the cancellation flag. Both are only *observed* at
//! two points: right after submission succeeds and when the HITL wait
//! resolves. All external events of a batch are applied before the machine
//! advances, so a cancel delivered in the same batch as an approval wins.
//!
//! ## Failures
//!
//! Every activity failure becomes `{success: false, error}`. The body never
//! raises.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Workflow state machine, signal handlers, replay

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use thiserror::Error;

use crate::domain::activity::{ActivityFailure, ActivityRequest, ActivityResult};
use crate::domain::history::{Command, CommandId, HistoryEvent};
use crate::domain::signal::{HitlApprovalPayload, WorkflowSignal};
use crate::domain::task::{FetchResponseRequest, HitlDecisionRequest, TaskInput, TaskSubmission};

pub const AGENT_WORKFLOW_TYPE: &str = "agentExecutionWorkflow";

/// Longest a workflow waits for a human decision.
pub const HITL_WAIT_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

pub const CANCELLED_BY_USER: &str = "Workflow cancelled by user";
pub const HITL_TIMEOUT: &str = "HITL approval timeout";
pub const HITL_DENIED: &str = "HITL approval denied";
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Terminal value of a workflow instance.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkflowOutput {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(
        rename = "requiresHITL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub requires_hitl: Option<bool>,
    #[serde(rename = "hitlPrompt", default, skip_serializing_if = "Option::is_none")]
    pub hitl_prompt: Option<String>,
}

impl WorkflowOutput {
    pub fn success(response: impl Into<String>) -> Self {
        Self {
            success: true,
            response: Some(response.into()),
            ..Self::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            error: Some(if error.is_empty() {
                UNKNOWN_ERROR.to_string()
            } else {
                error
            }),
            ..Self::default()
        }
    }

    /// Mark the output as produced by a task that paused for HITL.
    pub fn with_hitl(mut self, prompt: Option<String>) -> Self {
        self.requires_hitl = Some(true);
        self.hitl_prompt = prompt;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    Completed,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Running => "running",
            WorkflowStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(WorkflowStatus::Running),
            "completed" => Some(WorkflowStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowPhase {
    NotStarted,
    Submitting {
        activity_id: CommandId,
        input: TaskInput,
    },
    FetchingResponse {
        activity_id: CommandId,
    },
    AwaitingHitl {
        input: TaskInput,
        submission: TaskSubmission,
        timer_id: Option<CommandId>,
    },
    Resolving {
        activity_id: CommandId,
    },
    Done(WorkflowOutput),
}

impl WorkflowPhase {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowPhase::NotStarted => "not_started",
            WorkflowPhase::Submitting { .. } => "submitting",
            WorkflowPhase::FetchingResponse { .. } => "fetching_response",
            WorkflowPhase::AwaitingHitl { .. } => "awaiting_hitl",
            WorkflowPhase::Resolving { .. } => "resolving",
            WorkflowPhase::Done(_) => "done",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ReplayError {
    #[error("History does not start with a workflow_started event")]
    MissingStart,

    #[error("Unknown workflow type: {0}")]
    UnknownWorkflowType(String),

    #[error(
        "Nondeterminism at seq {seq}: history recorded {recorded:?} but replay produced {expected:?}"
    )]
    Nondeterminism {
        seq: usize,
        recorded: Vec<Command>,
        expected: Vec<Command>,
    },

    #[error("Command event {kind} at seq {seq} is not followed by a workflow task marker")]
    UnterminatedBatch { seq: usize, kind: &'static str },
}

type ActivityOutcome = Result<ActivityResult, ActivityFailure>;

/// In-flight state of one agent workflow instance.
#[derive(Debug, Clone)]
pub struct AgentWorkflow {
    input: Option<TaskInput>,
    phase: WorkflowPhase,
    hitl_approval: Option<HitlApprovalPayload>,
    cancelled: bool,
    next_command_id: CommandId,
    outcomes: HashMap<CommandId, ActivityOutcome>,
    fired_timers: HashSet<CommandId>,
}

impl Default for AgentWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentWorkflow {
    pub fn new() -> Self {
        Self {
            input: None,
            phase: WorkflowPhase::NotStarted,
            hitl_approval: None,
            cancelled: false,
            next_command_id: 1,
            outcomes: HashMap::new(),
            fired_timers: HashSet::new(),
        }
    }

    /// Rebuild the workflow from `history` and return it together with the
    /// commands it issues for the events after the last completed batch.
    pub fn replay<'a, I>(history: I) -> Result<(Self, Vec<Command>), ReplayError>
    where
        I: IntoIterator<Item = &'a HistoryEvent>,
    {
        let mut workflow = Self::new();
        let mut recorded: Vec<Command> = Vec::new();
        let mut seen_start = false;
        let mut last_command: Option<(usize, &'static str)> = None;

        for (index, event) in history.into_iter().enumerate() {
            let seq = index + 1;
            if let HistoryEvent::WorkflowStarted { workflow_type, .. } = event {
                if workflow_type != AGENT_WORKFLOW_TYPE {
                    return Err(ReplayError::UnknownWorkflowType(workflow_type.clone()));
                }
                seen_start = true;
            } else if !seen_start {
                return Err(ReplayError::MissingStart);
            }

            if let Some(command) = event.as_command() {
                last_command = Some((seq, event.kind()));
                recorded.push(command);
                continue;
            }

            match event {
                HistoryEvent::WorkflowTaskCompleted { .. } => {
                    let expected = workflow.advance();
                    if expected != recorded {
                        return Err(ReplayError::Nondeterminism {
                            seq,
                            recorded,
                            expected,
                        });
                    }
                    recorded.clear();
                    last_command = None;
                }
                external => {
                    if let Some((seq, kind)) = last_command {
                        return Err(ReplayError::UnterminatedBatch { seq, kind });
                    }
                    workflow.apply(external);
                }
            }
        }

        if !seen_start {
            return Err(ReplayError::MissingStart);
        }
        if let Some((seq, kind)) = last_command {
            return Err(ReplayError::UnterminatedBatch { seq, kind });
        }

        let commands = workflow.advance();
        Ok((workflow, commands))
    }

    pub fn phase(&self) -> &WorkflowPhase {
        &self.phase
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn output(&self) -> Option<&WorkflowOutput> {
        match &self.phase {
            WorkflowPhase::Done(output) => Some(output),
            _ => None,
        }
    }

    /// Apply an external event to workflow-local state.
    fn apply(&mut self, event: &HistoryEvent) {
        match event {
            HistoryEvent::WorkflowStarted { input, .. } => {
                self.input = Some(input.clone());
            }
            HistoryEvent::SignalReceived { signal } => self.handle_signal(signal),
            HistoryEvent::ActivityCompleted {
                activity_id,
                result,
            } => {
                self.outcomes.insert(*activity_id, Ok(result.clone()));
            }
            HistoryEvent::ActivityFailed {
                activity_id,
                failure,
            } => {
                self.outcomes.insert(*activity_id, Err(failure.clone()));
            }
            HistoryEvent::TimerFired { timer_id } => {
                self.fired_timers.insert(*timer_id);
            }
            _ => {}
        }
    }

    fn handle_signal(&mut self, signal: &WorkflowSignal) {
        // A finished workflow keeps its outcome.
        if matches!(self.phase, WorkflowPhase::Done(_)) {
            return;
        }
        match signal {
            WorkflowSignal::HitlApproval(payload) => {
                self.hitl_approval = Some(payload.clone());
            }
            WorkflowSignal::CancelWorkflow => {
                self.cancelled = true;
            }
        }
    }

    fn next_id(&mut self) -> CommandId {
        let id = self.next_command_id;
        self.next_command_id += 1;
        id
    }

    fn schedule(&mut self, request: ActivityRequest, commands: &mut Vec<Command>) -> CommandId {
        let activity_id = self.next_id();
        commands.push(Command::ScheduleActivity {
            activity_id,
            request,
        });
        activity_id
    }

    fn finish(&mut self, output: WorkflowOutput, commands: &mut Vec<Command>) {
        commands.push(Command::CompleteWorkflow {
            output: output.clone(),
        });
        self.phase = WorkflowPhase::Done(output);
    }

    /// Run the body forward until it blocks on an activity, timer or signal.
    fn advance(&mut self) -> Vec<Command> {
        let mut commands = Vec::new();

        loop {
            let phase = std::mem::replace(&mut self.phase, WorkflowPhase::NotStarted);
            let progressed = match phase {
                WorkflowPhase::NotStarted => match self.input.clone() {
                    Some(input) => {
                        let activity_id = self.schedule(
                            ActivityRequest::ExecuteAgentTask(input.clone()),
                            &mut commands,
                        );
                        self.phase = WorkflowPhase::Submitting { activity_id, input };
                        true
                    }
                    None => false,
                },

                WorkflowPhase::Submitting { activity_id, input } => {
                    match self.outcomes.remove(&activity_id) {
                        None => {
                            self.phase = WorkflowPhase::Submitting { activity_id, input };
                            false
                        }
                        Some(Err(failure)) => {
                            self.finish(WorkflowOutput::failure(failure.message), &mut commands);
                            true
                        }
                        Some(Ok(ActivityResult::TaskSubmitted(submission))) => {
                            self.on_submitted(input, submission, &mut commands);
                            true
                        }
                        Some(Ok(other)) => {
                            self.finish(unexpected_result(&other), &mut commands);
                            true
                        }
                    }
                }

                WorkflowPhase::AwaitingHitl {
                    input,
                    submission,
                    timer_id,
                } => self.poll_hitl_wait(input, submission, timer_id, &mut commands),

                WorkflowPhase::FetchingResponse { activity_id } => {
                    match self.outcomes.remove(&activity_id) {
                        None => {
                            self.phase = WorkflowPhase::FetchingResponse { activity_id };
                            false
                        }
                        Some(Ok(ActivityResult::ResponseFetched(response))) => {
                            self.finish(WorkflowOutput::success(response.content), &mut commands);
                            true
                        }
                        Some(Ok(other)) => {
                            self.finish(unexpected_result(&other), &mut commands);
                            true
                        }
                        Some(Err(failure)) => {
                            self.finish(WorkflowOutput::failure(failure.message), &mut commands);
                            true
                        }
                    }
                }

                WorkflowPhase::Resolving { activity_id } => {
                    match self.outcomes.remove(&activity_id) {
                        None => {
                            self.phase = WorkflowPhase::Resolving { activity_id };
                            false
                        }
                        Some(Ok(ActivityResult::HitlDecisionProcessed(result))) => {
                            self.finish(WorkflowOutput::success(result.response), &mut commands);
                            true
                        }
                        Some(Ok(other)) => {
                            self.finish(unexpected_result(&other), &mut commands);
                            true
                        }
                        Some(Err(failure)) => {
                            self.finish(WorkflowOutput::failure(failure.message), &mut commands);
                            true
                        }
                    }
                }

                done @ WorkflowPhase::Done(_) => {
                    self.phase = done;
                    false
                }
            };

            if !progressed || matches!(self.phase, WorkflowPhase::Done(_)) {
                return commands;
            }
        }
    }

    fn on_submitted(
        &mut self,
        input: TaskInput,
        submission: TaskSubmission,
        commands: &mut Vec<Command>,
    ) {
        if self.cancelled {
            self.finish(WorkflowOutput::failure(CANCELLED_BY_USER), commands);
            return;
        }

        if submission.requires_hitl {
            // The wait may already be satisfied by signals delivered during
            // submission; only arm the timer when it is not.
            let timer_id = if self.hitl_wait_satisfied() {
                None
            } else {
                let timer_id = self.next_id();
                commands.push(Command::StartTimer {
                    timer_id,
                    duration_secs: HITL_WAIT_TIMEOUT.as_secs(),
                });
                Some(timer_id)
            };
            self.phase = WorkflowPhase::AwaitingHitl {
                input,
                submission,
                timer_id,
            };
            return;
        }

        let activity_id = self.schedule(
            ActivityRequest::GetAgentResponse(FetchResponseRequest {
                agent_id: input.agent_id,
                session_id: input.session_id,
                task_id: submission.task_id,
            }),
            commands,
        );
        self.phase = WorkflowPhase::FetchingResponse { activity_id };
    }

    fn hitl_wait_satisfied(&self) -> bool {
        self.cancelled || self.hitl_approval.is_some()
    }

    fn poll_hitl_wait(
        &mut self,
        input: TaskInput,
        submission: TaskSubmission,
        timer_id: Option<CommandId>,
        commands: &mut Vec<Command>,
    ) -> bool {
        let timed_out = timer_id
            .map(|id| self.fired_timers.contains(&id))
            .unwrap_or(false);

        if !self.hitl_wait_satisfied() && !timed_out {
            self.phase = WorkflowPhase::AwaitingHitl {
                input,
                submission,
                timer_id,
            };
            return false;
        }

        if let Some(timer_id) = timer_id.filter(|_| !timed_out) {
            commands.push(Command::CancelTimer { timer_id });
        }

        let prompt = submission.hitl_prompt.clone();

        if self.cancelled {
            self.finish(
                WorkflowOutput::failure(CANCELLED_BY_USER).with_hitl(prompt),
                commands,
            );
            return true;
        }

        match self.hitl_approval.clone() {
            None => {
                self.finish(WorkflowOutput::failure(HITL_TIMEOUT).with_hitl(prompt), commands);
            }
            Some(HitlApprovalPayload {
                approved: false, ..
            }) => {
                self.finish(WorkflowOutput::failure(HITL_DENIED).with_hitl(None), commands);
            }
            Some(HitlApprovalPayload {
                approved: true,
                feedback,
            }) => {
                let activity_id = self.schedule(
                    ActivityRequest::ProcessHitlApproval(HitlDecisionRequest {
                        agent_id: input.agent_id,
                        session_id: input.session_id,
                        task_id: submission.task_id,
                        feedback,
                    }),
                    commands,
                );
                self.phase = WorkflowPhase::Resolving { activity_id };
            }
        }
        true
    }

}

fn unexpected_result(result: &ActivityResult) -> WorkflowOutput {
    WorkflowOutput::failure(format!("Unexpected activity result: {:?}", result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::{AgentResponse, HitlDecisionResponse, TaskStatus};

    fn started() -> HistoryEvent {
        HistoryEvent::WorkflowStarted {
            workflow_type: AGENT_WORKFLOW_TYPE.to_string(),
            task_queue: "hyyve-agent-tasks".to_string(),
            input: TaskInput::new("bond", "s1", "hi"),
        }
    }

    fn marker() -> HistoryEvent {
        HistoryEvent::WorkflowTaskCompleted {
            identity: "test".to_string(),
        }
    }

    fn submitted(requires_hitl: bool) -> HistoryEvent {
        HistoryEvent::ActivityCompleted {
            activity_id: 1,
            result: ActivityResult::TaskSubmitted(TaskSubmission {
                task_id: "t1".to_string(),
                status: if requires_hitl {
                    TaskStatus::RequiresHitl
                } else {
                    TaskStatus::Completed
                },
                requires_hitl,
                hitl_prompt: requires_hitl.then(|| "Approve refund?".to_string()),
            }),
        }
    }

    fn signal(signal: WorkflowSignal) -> HistoryEvent {
        HistoryEvent::SignalReceived { signal }
    }

    /// Drive the machine batch by batch, committing its commands like a worker.
    fn run(batches: Vec<Vec<HistoryEvent>>) -> (Vec<HistoryEvent>, AgentWorkflow) {
        let mut history = Vec::new();
        let mut last = None;
        for batch in batches {
            history.extend(batch);
            let (workflow, commands) = AgentWorkflow::replay(&history).unwrap();
            history.extend(commands.iter().map(Command::to_event));
            history.push(marker());
            last = Some(workflow);
        }
        (history, last.unwrap())
    }

    fn final_output(workflow: &AgentWorkflow) -> WorkflowOutput {
        workflow.output().cloned().expect("workflow should be done")
    }

    #[test]
    fn test_start_schedules_submission() {
        let (workflow, commands) = AgentWorkflow::replay(&[started()]).unwrap();

        assert_eq!(
            commands,
            vec![Command::ScheduleActivity {
                activity_id: 1,
                request: ActivityRequest::ExecuteAgentTask(TaskInput::new("bond", "s1", "hi")),
            }]
        );
        assert_eq!(workflow.phase().name(), "submitting");
    }

    #[test]
    fn test_follow_up_requests_carry_start_identity() {
        let start = HistoryEvent::WorkflowStarted {
            workflow_type: AGENT_WORKFLOW_TYPE.to_string(),
            task_queue: "hyyve-agent-tasks".to_string(),
            input: TaskInput::new("vesper", "s9", "refund order 7"),
        };
        let (history, workflow) = run(vec![
            vec![start],
            vec![submitted(true)],
            vec![signal(WorkflowSignal::HitlApproval(HitlApprovalPayload::approve(None)))],
        ]);

        assert_eq!(workflow.phase().name(), "resolving");
        let request = history.iter().find_map(|e| match e {
            HistoryEvent::ActivityScheduled {
                request: ActivityRequest::ProcessHitlApproval(request),
                ..
            } => Some(request.clone()),
            _ => None,
        });
        assert_eq!(
            request,
            Some(HitlDecisionRequest {
                agent_id: "vesper".to_string(),
                session_id: "s9".to_string(),
                task_id: "t1".to_string(),
                feedback: None,
            })
        );
    }

    #[test]
    fn test_completed_task_fetches_response() {
        let (history, workflow) = run(vec![vec![started()], vec![submitted(false)]]);

        assert_eq!(workflow.phase().name(), "fetching_response");
        assert!(history.iter().any(|e| matches!(
            e,
            HistoryEvent::ActivityScheduled {
                activity_id: 2,
                request: ActivityRequest::GetAgentResponse(FetchResponseRequest { task_id, .. }),
            } if task_id == "t1"
        )));

        let (_, workflow) = run(vec![
            vec![started()],
            vec![submitted(false)],
            vec![HistoryEvent::ActivityCompleted {
                activity_id: 2,
                result: ActivityResult::ResponseFetched(AgentResponse {
                    content: "hello back".to_string(),
                    metadata: None,
                }),
            }],
        ]);
        assert_eq!(final_output(&workflow), WorkflowOutput::success("hello back"));
    }

    #[test]
    fn test_submission_failure_finishes_with_message() {
        let (_, workflow) = run(vec![
            vec![started()],
            vec![HistoryEvent::ActivityFailed {
                activity_id: 1,
                failure: ActivityFailure {
                    message: "Agent service error: 400 - bad agent".to_string(),
                    error_type: Some("AGENT_SERVICE_ERROR".to_string()),
                    non_retryable: true,
                    attempts: 1,
                },
            }],
        ]);

        let output = final_output(&workflow);
        assert!(!output.success);
        assert_eq!(output.error.as_deref(), Some("Agent service error: 400 - bad agent"));
        assert_eq!(output.requires_hitl, None);
    }

    #[test]
    fn test_cancel_during_submission_wins_over_result() {
        let (_, workflow) = run(vec![
            vec![started()],
            vec![signal(WorkflowSignal::CancelWorkflow), submitted(false)],
        ]);

        assert_eq!(final_output(&workflow), WorkflowOutput::failure(CANCELLED_BY_USER));
    }

    #[test]
    fn test_hitl_arms_timer_then_approval_resolves() {
        let (history, workflow) = run(vec![vec![started()], vec![submitted(true)]]);
        assert_eq!(workflow.phase().name(), "awaiting_hitl");
        assert!(history.contains(&HistoryEvent::TimerStarted {
            timer_id: 2,
            duration_secs: 86_400,
        }));

        let (history, workflow) = run(vec![
            vec![started()],
            vec![submitted(true)],
            vec![signal(WorkflowSignal::HitlApproval(HitlApprovalPayload::approve(Some(
                "refund it".to_string(),
            ))))],
        ]);
        assert_eq!(workflow.phase().name(), "resolving");
        assert!(history.contains(&HistoryEvent::TimerCancelled { timer_id: 2 }));
        assert!(history.iter().any(|e| matches!(
            e,
            HistoryEvent::ActivityScheduled {
                activity_id: 3,
                request: ActivityRequest::ProcessHitlApproval(HitlDecisionRequest { feedback: Some(f), .. }),
            } if f == "refund it"
        )));

        let (_, workflow) = run(vec![
            vec![started()],
            vec![submitted(true)],
            vec![signal(WorkflowSignal::HitlApproval(HitlApprovalPayload::approve(None)))],
            vec![HistoryEvent::ActivityCompleted {
                activity_id: 3,
                result: ActivityResult::HitlDecisionProcessed(HitlDecisionResponse {
                    response: "refund issued".to_string(),
                    metadata: None,
                }),
            }],
        ]);
        assert_eq!(final_output(&workflow), WorkflowOutput::success("refund issued"));
    }

    #[test]
    fn test_hitl_denied() {
        let (_, workflow) = run(vec![
            vec![started()],
            vec![submitted(true)],
            vec![signal(WorkflowSignal::HitlApproval(HitlApprovalPayload::deny(None)))],
        ]);

        let output = final_output(&workflow);
        assert_eq!(output.error.as_deref(), Some(HITL_DENIED));
        assert_eq!(output.requires_hitl, Some(true));
        assert_eq!(output.hitl_prompt, None);
    }

    #[test]
    fn test_hitl_timeout_keeps_prompt() {
        let (history, workflow) = run(vec![
            vec![started()],
            vec![submitted(true)],
            vec![HistoryEvent::TimerFired { timer_id: 2 }],
        ]);

        let output = final_output(&workflow);
        assert!(!output.success);
        assert!(output.error.unwrap().contains("timeout"));
        assert_eq!(output.requires_hitl, Some(true));
        assert_eq!(output.hitl_prompt.as_deref(), Some("Approve refund?"));
        assert!(!history.contains(&HistoryEvent::TimerCancelled { timer_id: 2 }));
    }

    #[test]
    fn test_cancel_beats_approval_in_either_order() {
        let approve = || signal(WorkflowSignal::HitlApproval(HitlApprovalPayload::approve(None)));
        let cancel = || signal(WorkflowSignal::CancelWorkflow);

        for batch in [vec![approve(), cancel()], vec![cancel(), approve()]] {
            let (_, workflow) = run(vec![vec![started()], vec![submitted(true)], batch]);
            let output = final_output(&workflow);
            assert_eq!(output.error.as_deref(), Some(CANCELLED_BY_USER));
            assert_eq!(output.requires_hitl, Some(true));
            assert_eq!(output.hitl_prompt.as_deref(), Some("Approve refund?"));
        }
    }

    #[test]
    fn test_approval_before_submission_skips_timer() {
        let (history, workflow) = run(vec![
            vec![started()],
            vec![
                signal(WorkflowSignal::HitlApproval(HitlApprovalPayload::approve(None))),
                submitted(true),
            ],
        ]);

        assert_eq!(workflow.phase().name(), "resolving");
        assert!(!history
            .iter()
            .any(|e| matches!(e, HistoryEvent::TimerStarted { .. })));
    }

    #[test]
    fn test_last_approval_wins() {
        let (_, workflow) = run(vec![
            vec![started()],
            vec![submitted(true)],
            vec![
                signal(WorkflowSignal::HitlApproval(HitlApprovalPayload::approve(None))),
                signal(WorkflowSignal::HitlApproval(HitlApprovalPayload::deny(None))),
            ],
        ]);

        assert_eq!(final_output(&workflow).error.as_deref(), Some(HITL_DENIED));
    }

    #[test]
    fn test_signals_after_done_do_not_change_outcome() {
        let (mut history, _) = run(vec![
            vec![started()],
            vec![submitted(true)],
            vec![signal(WorkflowSignal::HitlApproval(HitlApprovalPayload::deny(None)))],
        ]);
        history.push(signal(WorkflowSignal::CancelWorkflow));

        let (workflow, commands) = AgentWorkflow::replay(&history).unwrap();
        assert!(commands.is_empty());
        assert_eq!(final_output(&workflow).error.as_deref(), Some(HITL_DENIED));
        assert!(!workflow.is_cancelled());
    }

    #[test]
    fn test_cancel_while_fetching_is_not_observed() {
        let (_, workflow) = run(vec![
            vec![started()],
            vec![submitted(false)],
            vec![signal(WorkflowSignal::CancelWorkflow)],
            vec![HistoryEvent::ActivityCompleted {
                activity_id: 2,
                result: ActivityResult::ResponseFetched(AgentResponse {
                    content: "late but fine".to_string(),
                    metadata: None,
                }),
            }],
        ]);

        assert_eq!(final_output(&workflow), WorkflowOutput::success("late but fine"));
    }

    #[test]
    fn test_replay_detects_tampered_history() {
        let (mut history, _) = run(vec![vec![started()]]);
        history[1] = HistoryEvent::TimerStarted {
            timer_id: 1,
            duration_secs: 5,
        };

        assert!(matches!(
            AgentWorkflow::replay(&history),
            Err(ReplayError::Nondeterminism { seq: 3, .. })
        ));
    }

    #[test]
    fn test_replay_rejects_foreign_history() {
        assert_eq!(
            AgentWorkflow::replay(&[marker()]).unwrap_err(),
            ReplayError::MissingStart
        );

        let foreign = HistoryEvent::WorkflowStarted {
            workflow_type: "billingWorkflow".to_string(),
            task_queue: "q".to_string(),
            input: TaskInput::new("a", "b", "c"),
        };
        assert_eq!(
            AgentWorkflow::replay(&[foreign]).unwrap_err(),
            ReplayError::UnknownWorkflowType("billingWorkflow".to_string())
        );
    }

    #[test]
    fn test_output_wire_names() {
        let output = WorkflowOutput::failure(HITL_TIMEOUT).with_hitl(Some("ok?".to_string()));
        let value = serde_json::to_value(&output).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "success": false,
                "error": "HITL approval timeout",
                "requiresHITL": true,
                "hitlPrompt": "ok?"
            })
        );
    }
}
