// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Activity Retry Policy
//!
//! Exponential backoff applied uniformly to every Agent Service call made by
//! the agent workflow. Attempts are numbered from 1.
//!
//! | Attempt that failed | Delay before next attempt |
//! |---------------------|---------------------------|
//! | 1                   | 1s                        |
//! | 2                   | 2s                        |
//! | 3                   | 4s                        |
//! | 4                   | 8s                        |
//! | 5                   | none (exhausted)          |
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Retry/backoff decisions for activity attempts

use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub maximum_attempts: u32,
    pub initial_interval: Duration,
    pub backoff_coefficient: f64,
    pub maximum_interval: Duration,
    /// Upper bound on a single attempt.
    pub start_to_close_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            maximum_attempts: 5,
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            maximum_interval: Duration::from_secs(30),
            start_to_close_timeout: Duration::from_secs(5 * 60),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `failed_attempt`, or `None` once the
    /// attempt budget is spent.
    pub fn next_delay(&self, failed_attempt: u32) -> Option<Duration> {
        if failed_attempt >= self.maximum_attempts {
            return None;
        }
        let exponent = failed_attempt.saturating_sub(1) as i32;
        let secs = self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);
        let capped = secs.min(self.maximum_interval.as_secs_f64());
        Some(Duration::from_secs_f64(capped))
    }
}
