// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `hyyve worker`: poll the task queue and execute agent workflows until a
//! shutdown signal arrives.

use anyhow::{Context, Result};
use clap::Args;
use hyyve_core::application::worker::Worker;
use hyyve_core::infrastructure::agent_service_client::AgentServiceClient;
use hyyve_core::infrastructure::config::OrchestratorConfig;
use hyyve_core::infrastructure::journal::PostgresJournal;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Args, Debug)]
pub struct WorkerArgs {
    /// Base URL of the Agent Service
    #[arg(long, env = "AGENT_SERVICE_URL")]
    agent_service_url: Option<String>,

    /// Maximum activity attempts executed at once
    #[arg(long, env = "HYYVE_MAX_CONCURRENT_ACTIVITIES")]
    max_concurrent_activities: Option<usize>,

    /// Idle delay between polls, in milliseconds
    #[arg(long, env = "HYYVE_POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,

    /// Lease owner name recorded in the journal (default: pid@hostname)
    #[arg(long)]
    identity: Option<String>,
}

impl WorkerArgs {
    fn apply(&self, config: &mut OrchestratorConfig) {
        if let Some(url) = &self.agent_service_url {
            config.agent_service.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(n) = self.max_concurrent_activities.filter(|n| *n > 0) {
            config.worker.max_concurrent_activities = n;
        }
        if let Some(ms) = self.poll_interval_ms.filter(|ms| *ms > 0) {
            config.worker.poll_interval = Duration::from_millis(ms);
        }
    }
}

pub async fn run(args: WorkerArgs, mut config: OrchestratorConfig) -> Result<()> {
    args.apply(&mut config);
    config.validate()?;

    let journal = PostgresJournal::connect(
        &config.address,
        &config.namespace,
        config.worker.max_connections,
    )
    .await
    .context("Failed to open workflow journal")?;
    let activities = AgentServiceClient::new(&config.agent_service)?;

    let mut worker = Worker::new(
        Arc::new(journal),
        Arc::new(activities),
        config.task_queue.clone(),
        config.worker.clone(),
    );
    if let Some(identity) = args.identity {
        worker = worker.with_identity(identity);
    }

    info!(
        identity = worker.identity(),
        task_queue = worker.task_queue(),
        namespace = %config.namespace,
        agent_service = %config.agent_service.base_url,
        "Starting Hyyve worker"
    );

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.cancel();
    });

    worker.run(shutdown).await?;
    info!("Worker shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
