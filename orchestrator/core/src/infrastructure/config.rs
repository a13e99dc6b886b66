// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Orchestrator Configuration
//!
//! Built once at startup and passed down explicitly. Every field has a
//! default; environment variables override them.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `TEMPORAL_ADDRESS` | `localhost:7233` |
//! | `TEMPORAL_NAMESPACE` | `default` |
//! | `TEMPORAL_TASK_QUEUE` | `hyyve-agent-tasks` |
//! | `AGENT_SERVICE_URL` | `http://localhost:8000` |
//! | `HYYVE_MAX_CONCURRENT_ACTIVITIES` | `10` |
//! | `HYYVE_POLL_INTERVAL_MS` | `500` |
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Worker, journal and Agent Service settings

use std::time::Duration;

use crate::domain::retry::RetryPolicy;

pub const DEFAULT_ADDRESS: &str = "localhost:7233";
pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_TASK_QUEUE: &str = "hyyve-agent-tasks";
pub const DEFAULT_AGENT_SERVICE_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, PartialEq)]
pub struct AgentServiceConfig {
    pub base_url: String,
    /// Client-side timeout of one HTTP request.
    pub request_timeout: Duration,
}

impl Default for AgentServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_AGENT_SERVICE_URL.to_string(),
            request_timeout: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    pub poll_interval: Duration,
    pub max_concurrent_activities: usize,
    pub workflow_task_lease: Duration,
    pub max_connections: u32,
    pub retry_policy: RetryPolicy,
    /// `Worker::run` fails after this many poll cycles in a row error out.
    pub max_consecutive_poll_failures: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            max_concurrent_activities: 10,
            workflow_task_lease: Duration::from_secs(10),
            max_connections: 5,
            retry_policy: RetryPolicy::default(),
            max_consecutive_poll_failures: 20,
        }
    }
}

impl WorkerConfig {
    /// Activity leases outlive the start-to-close timeout so a live attempt
    /// is never handed to a second worker.
    pub fn activity_task_lease(&self) -> Duration {
        self.retry_policy.start_to_close_timeout + Duration::from_secs(30)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub address: String,
    pub namespace: String,
    pub task_queue: String,
    pub agent_service: AgentServiceConfig,
    pub worker: WorkerConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            task_queue: DEFAULT_TASK_QUEUE.to_string(),
            agent_service: AgentServiceConfig::default(),
            worker: WorkerConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source. Empty values are
    /// treated as unset.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(val) = get("TEMPORAL_ADDRESS") {
            self.address = val;
        }
        if let Some(val) = get("TEMPORAL_NAMESPACE") {
            self.namespace = val;
        }
        if let Some(val) = get("TEMPORAL_TASK_QUEUE") {
            self.task_queue = val;
        }
        if let Some(val) = get("AGENT_SERVICE_URL") {
            self.agent_service.base_url = val.trim_end_matches('/').to_string();
        }
        if let Some(val) = get("HYYVE_MAX_CONCURRENT_ACTIVITIES") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => self.worker.max_concurrent_activities = n,
                _ => tracing::warn!(
                    "Invalid value for HYYVE_MAX_CONCURRENT_ACTIVITIES: '{}'. Expected a positive integer. Ignoring.",
                    val
                ),
            }
        }
        if let Some(val) = get("HYYVE_POLL_INTERVAL_MS") {
            match val.parse::<u64>() {
                Ok(ms) if ms > 0 => self.worker.poll_interval = Duration::from_millis(ms),
                _ => tracing::warn!(
                    "Invalid value for HYYVE_POLL_INTERVAL_MS: '{}'. Expected milliseconds. Ignoring.",
                    val
                ),
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.address.trim().is_empty() {
            anyhow::bail!("Orchestrator address must not be empty");
        }
        if self.namespace.trim().is_empty() {
            anyhow::bail!("Namespace must not be empty");
        }
        if self.task_queue.trim().is_empty() {
            anyhow::bail!("Task queue must not be empty");
        }
        let url = &self.agent_service.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("Invalid AGENT_SERVICE_URL: '{}'. Must be an http(s) URL", url);
        }
        Ok(())
    }
}
