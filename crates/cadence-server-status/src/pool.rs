// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};
use std::str::FromStr;

use crate::error::StatusError;

/// Create a SqlitePool with WAL mode and common settings.
///
/// # Arguments
/// * `database_url` - SQLite connection string (e.g., "sqlite:./cadence.db")
///
/// # Errors
/// Returns `StatusError::Internal` if the URL is invalid, or
/// `StatusError::Database` if the connection fails.
#[tracing::instrument(skip(database_url))]
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, StatusError> {
	let options = SqliteConnectOptions::from_str(database_url)
		.map_err(|e| StatusError::Internal(format!("Invalid database URL: {e}")))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.create_if_missing(true);

	let pool = SqlitePool::connect_with(options).await?;

	tracing::debug!("database pool created");
	Ok(pool)
}

/// Create the run-status table if it does not exist yet.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), StatusError> {
	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS run_status (
			tenant_id TEXT NOT NULL,
			job_type TEXT NOT NULL,
			schedule_id TEXT NOT NULL DEFAULT '',
			run_id TEXT,
			status TEXT NOT NULL CHECK (status IN ('SCHEDULED', 'RUNNING', 'COMPLETED', 'FAILED')),
			last_run TEXT,
			next_run TEXT,
			error_message TEXT,
			retry_count INTEGER NOT NULL DEFAULT 0,
			updated_at TEXT NOT NULL,
			PRIMARY KEY (tenant_id, job_type, schedule_id)
		)
		"#,
	)
	.execute(pool)
	.await?;

	sqlx::query("CREATE INDEX IF NOT EXISTS idx_run_status_status ON run_status(status)")
		.execute(pool)
		.await?;

	tracing::debug!("run_status migrations applied");
	Ok(())
}
