// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Workflow command implementations
//!
//! # Commands
//!
//! - `hyyve workflow start <agent> <session> <message>` - Start an agent workflow
//! - `hyyve workflow approve <id>` / `deny <id>` - Answer a pending HITL request
//! - `hyyve workflow cancel <id>` - Ask the workflow to stop
//! - `hyyve workflow signal <id> <name> [--payload JSON]` - Send any signal by wire name
//! - `hyyve workflow result <id>` - Print the final output, waiting by default
//! - `hyyve workflow describe <id>` - Show status and timestamps
//!
//! Outputs are printed as JSON on stdout.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use hyyve_core::infrastructure::config::OrchestratorConfig;
use hyyve_sdk::{
    HitlApprovalPayload, SignalDelivery, TaskInput, WorkflowClient, WorkflowHandle,
};
use std::collections::HashMap;

#[derive(Subcommand)]
pub enum WorkflowCommand {
    /// Start an agent workflow
    Start {
        #[arg(value_name = "AGENT_ID")]
        agent_id: String,

        #[arg(value_name = "SESSION_ID")]
        session_id: String,

        #[arg(value_name = "MESSAGE")]
        message: String,

        /// Extra context passed to the agent (JSON object)
        #[arg(long, short = 'c', value_name = "JSON")]
        context: Option<String>,

        /// Explicit workflow id (default: agent-{AGENT_ID}-{epoch millis})
        #[arg(long, value_name = "ID")]
        workflow_id: Option<String>,

        /// Wait for the workflow to finish and print its output
        #[arg(long, short = 'w')]
        wait: bool,
    },

    /// Approve a pending HITL request
    Approve {
        #[arg(value_name = "WORKFLOW_ID")]
        workflow_id: String,

        #[arg(long, short = 'f')]
        feedback: Option<String>,
    },

    /// Deny a pending HITL request
    Deny {
        #[arg(value_name = "WORKFLOW_ID")]
        workflow_id: String,

        #[arg(long, short = 'f')]
        feedback: Option<String>,
    },

    /// Cancel a workflow
    Cancel {
        #[arg(value_name = "WORKFLOW_ID")]
        workflow_id: String,
    },

    /// Send a signal by its wire name (hitlApproval, cancelWorkflow)
    Signal {
        #[arg(value_name = "WORKFLOW_ID")]
        workflow_id: String,

        #[arg(value_name = "NAME")]
        name: String,

        /// Signal payload (JSON)
        #[arg(long, short = 'p', value_name = "JSON")]
        payload: Option<String>,
    },

    /// Print a workflow's output
    Result {
        #[arg(value_name = "WORKFLOW_ID")]
        workflow_id: String,

        /// Return immediately if the workflow is still running
        #[arg(long)]
        no_wait: bool,
    },

    /// Show workflow status
    Describe {
        #[arg(value_name = "WORKFLOW_ID")]
        workflow_id: String,
    },
}

pub async fn handle_command(command: WorkflowCommand, config: OrchestratorConfig) -> Result<()> {
    config.validate()?;
    let client = WorkflowClient::connect(&config)
        .await
        .context("Failed to connect to the orchestrator")?;

    let outcome = match command {
        WorkflowCommand::Start {
            agent_id,
            session_id,
            message,
            context,
            workflow_id,
            wait,
        } => {
            let mut input = TaskInput::new(agent_id, session_id, message);
            if let Some(raw) = context {
                input = input.with_context(parse_context(&raw)?);
            }
            start_workflow(&client, input, workflow_id, wait).await
        }
        WorkflowCommand::Approve {
            workflow_id,
            feedback,
        } => {
            let handle = client.handle(workflow_id);
            let delivery = handle.approve(HitlApprovalPayload::approve(feedback)).await?;
            report_delivery(&handle, "hitlApproval", delivery);
            Ok(())
        }
        WorkflowCommand::Deny {
            workflow_id,
            feedback,
        } => {
            let handle = client.handle(workflow_id);
            let delivery = handle.approve(HitlApprovalPayload::deny(feedback)).await?;
            report_delivery(&handle, "hitlApproval", delivery);
            Ok(())
        }
        WorkflowCommand::Cancel { workflow_id } => {
            let handle = client.handle(workflow_id);
            let delivery = handle.cancel().await?;
            report_delivery(&handle, "cancelWorkflow", delivery);
            Ok(())
        }
        WorkflowCommand::Signal {
            workflow_id,
            name,
            payload,
        } => {
            let payload = payload.as_deref().map(parse_payload).transpose()?;
            let handle = client.handle(workflow_id);
            let delivery = handle.signal_by_name(&name, payload).await?;
            report_delivery(&handle, &name, delivery);
            Ok(())
        }
        WorkflowCommand::Result {
            workflow_id,
            no_wait,
        } => print_result(&client.handle(workflow_id), !no_wait).await,
        WorkflowCommand::Describe { workflow_id } => {
            let description = client.handle(workflow_id).describe().await?;
            println!("{}", serde_json::to_string_pretty(&description)?);
            Ok(())
        }
    };

    client.close().await;
    outcome
}

fn parse_context(raw: &str) -> Result<HashMap<String, serde_json::Value>> {
    serde_json::from_str(raw).context("Invalid --context: expected a JSON object")
}

fn parse_payload(raw: &str) -> Result<serde_json::Value> {
    serde_json::from_str(raw).context("Invalid --payload: expected JSON")
}

async fn start_workflow(
    client: &WorkflowClient,
    input: TaskInput,
    workflow_id: Option<String>,
    wait: bool,
) -> Result<()> {
    let handle = client.start_agent_workflow(input, workflow_id).await?;

    eprintln!("{}", "✓ Workflow started".green().bold());
    eprintln!("  Workflow ID: {}", handle.workflow_id());
    println!("{}", handle.workflow_id());

    if wait {
        print_result(&handle, true).await?;
    }
    Ok(())
}

async fn print_result(handle: &WorkflowHandle, wait: bool) -> Result<()> {
    let output = if wait {
        Some(handle.result().await?)
    } else {
        handle.try_result().await?
    };

    match output {
        Some(output) => println!("{}", serde_json::to_string_pretty(&output)?),
        None => eprintln!(
            "{}",
            format!("Workflow {} is still running", handle.workflow_id()).yellow()
        ),
    }
    Ok(())
}

fn report_delivery(handle: &WorkflowHandle, signal: &str, delivery: SignalDelivery) {
    match delivery {
        SignalDelivery::Delivered => eprintln!(
            "{}",
            format!("✓ Sent {} to {}", signal, handle.workflow_id()).green()
        ),
        SignalDelivery::Ignored => eprintln!(
            "{}",
            format!(
                "⚠ Workflow {} already completed; {} ignored",
                handle.workflow_id(),
                signal
            )
            .yellow()
        ),
    }
}
