// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Connection Pool
//!
//! Wraps `sqlx::postgres::PgPool` in a thin `Database` newtype shared by the
//! durable journal and anything else that needs the orchestrator database.
//!
//! The orchestrator address (`TEMPORAL_ADDRESS`) is either a bare `host:port`
//! or a full connection URL. User, password and database name come from the
//! standard `PGUSER` / `PGPASSWORD` / `PGDATABASE` variables when the address
//! does not carry them.

use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn with_max_connections(address: &str, max_connections: u32) -> Result<Self> {
        let url = connection_url(address);
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&url)
            .await
            .with_context(|| format!("Failed to connect to orchestrator database at {}", address))?;

        Ok(Self { pool })
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Turn an orchestrator address into a connection URL.
pub fn connection_url(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("postgres://{}", address)
    }
}
