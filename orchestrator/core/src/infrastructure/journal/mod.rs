// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Workflow journal implementations.

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryJournal;
pub use postgres::PostgresJournal;
