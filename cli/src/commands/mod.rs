// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Hyyve CLI

pub mod worker;
pub mod workflow;

pub use self::worker::WorkerArgs;
pub use self::workflow::WorkflowCommand;
