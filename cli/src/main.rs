// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Hyyve Orchestrator CLI
//!
//! The `hyyve` binary hosts the agent workflow worker and lets an operator
//! drive workflows from a shell.
//!
//! ## Commands
//!
//! - `hyyve worker` - Run a worker until Ctrl+C or SIGTERM
//! - `hyyve workflow start|approve|deny|cancel|result|describe` - Caller operations
//!
//! Settings come from flags, then the environment (a `.env` file is loaded
//! first), then built-in defaults.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use hyyve_core::infrastructure::config::OrchestratorConfig;

mod commands;

use commands::{WorkerArgs, WorkflowCommand};

/// Hyyve orchestrator - durable agent task execution
#[derive(Parser)]
#[command(name = "hyyve")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Orchestrator database address
    #[arg(long, global = true, env = "TEMPORAL_ADDRESS")]
    address: Option<String>,

    /// Namespace isolating this deployment's workflows
    #[arg(long, global = true, env = "TEMPORAL_NAMESPACE")]
    namespace: Option<String>,

    /// Task queue workers poll and workflows are started on
    #[arg(long, global = true, env = "TEMPORAL_TASK_QUEUE")]
    task_queue: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "HYYVE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow worker
    #[command(name = "worker")]
    Worker(WorkerArgs),

    /// Start, signal and inspect agent workflows
    #[command(name = "workflow")]
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommand,
    },
}

impl Cli {
    fn orchestrator_config(&self) -> OrchestratorConfig {
        let mut config = OrchestratorConfig::from_env();
        if let Some(address) = &self.address {
            config.address = address.clone();
        }
        if let Some(namespace) = &self.namespace {
            config.namespace = namespace.clone();
        }
        if let Some(task_queue) = &self.task_queue {
            config.task_queue = task_queue.clone();
        }
        config
    }
}

#[tokio::main]
async fn main() {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    init_logging(&cli.log_level)?;

    let config = cli.orchestrator_config();

    match cli.command {
        Some(Commands::Worker(args)) => commands::worker::run(args, config).await,
        Some(Commands::Workflow { command }) => {
            commands::workflow::handle_command(command, config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
