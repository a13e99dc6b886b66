// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Hyyve Orchestrator Core
//!
//! Durable agent-execution workflow: the workflow state machine, the event
//! journal it is replayed from, the Agent Service activities and the worker
//! that hosts them.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, application services and infrastructure
//!   adapters of the orchestrator

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use domain::*;
