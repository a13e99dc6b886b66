// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod activity_executor;
pub mod worker;

pub use activity_executor::{ActivityExecutor, AttemptOutcome};
pub use worker::{default_identity, TickReport, Worker};
