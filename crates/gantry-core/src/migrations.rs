// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embedded database migrations.

use sqlx::PgPool;
use sqlx::migrate::Migrator;

use crate::error::Result;

/// Migrations compiled into the binary from `migrations/postgresql`.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations/postgresql");

/// Apply pending migrations.
pub async fn run(pool: &PgPool) -> Result<()> {
    tracing::info!("running database migrations");
    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| crate::error::EngineError::Database {
            operation: "migrate".to_string(),
            details: e.to_string(),
        })?;
    Ok(())
}
