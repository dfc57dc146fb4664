// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use cadence_jobs_core::{JobTypeAllowList, StoreFailurePolicy};
use sqlx::sqlite::SqlitePool;

use crate::pool::run_migrations;
use crate::registry::RunStatusRegistry;
use crate::sqlite::SqliteStatusStore;
use crate::store::StatusStore;

pub async fn create_test_pool() -> SqlitePool {
	// A single connection keeps every query on the same in-memory database.
	let pool = sqlx::sqlite::SqlitePoolOptions::new()
		.max_connections(1)
		.connect("sqlite::memory:")
		.await
		.unwrap();
	run_migrations(&pool).await.unwrap();
	pool
}

pub async fn create_test_store() -> (SqlitePool, Arc<dyn StatusStore>) {
	let pool = create_test_pool().await;
	let store: Arc<dyn StatusStore> = Arc::new(SqliteStatusStore::new(pool.clone()));
	(pool, store)
}

pub fn allow_list() -> JobTypeAllowList {
	JobTypeAllowList::new(["email-sync", "lead-scoring"])
}

pub fn registry(store: Arc<dyn StatusStore>, policy: StoreFailurePolicy) -> Arc<RunStatusRegistry> {
	Arc::new(RunStatusRegistry::new(store, allow_list(), policy))
}
