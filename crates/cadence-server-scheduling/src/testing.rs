// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

use cadence_jobs_core::{JobTypeAllowList, RunStatus, RunStatusUpdate, StoreFailurePolicy};
use cadence_server_status::{run_migrations, RunStatusRegistry, SqliteStatusStore, StatusStore};

pub async fn create_test_store() -> (SqlitePool, Arc<dyn StatusStore>) {
	// A single connection keeps every query on the same in-memory database.
	let pool = sqlx::sqlite::SqlitePoolOptions::new()
		.max_connections(1)
		.connect("sqlite::memory:")
		.await
		.unwrap();
	run_migrations(&pool).await.unwrap();
	let store: Arc<dyn StatusStore> = Arc::new(SqliteStatusStore::new(pool.clone()));
	(pool, store)
}

pub fn registry(store: Arc<dyn StatusStore>) -> Arc<RunStatusRegistry> {
	Arc::new(RunStatusRegistry::new(
		store,
		JobTypeAllowList::new(["email-sync", "lead-scoring"]),
		StoreFailurePolicy::default(),
	))
}

/// Write one row as if it had been updated at `at`.
pub async fn seed(
	store: &Arc<dyn StatusStore>,
	tenant: &str,
	job_type: &str,
	status: RunStatus,
	at: DateTime<Utc>,
) {
	let mut update = RunStatusUpdate::new(tenant, job_type, status);
	if status == RunStatus::Failed {
		update = update.with_error("workflow failed");
	}
	store.upsert_status(&[update.into_record(at)]).await.unwrap();
}
