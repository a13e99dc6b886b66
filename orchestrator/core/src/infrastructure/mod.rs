// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod agent_service_client;
pub mod config;
pub mod db;
pub mod journal;

pub use agent_service_client::AgentServiceClient;
pub use config::{AgentServiceConfig, OrchestratorConfig, WorkerConfig};
pub use journal::{InMemoryJournal, PostgresJournal};
