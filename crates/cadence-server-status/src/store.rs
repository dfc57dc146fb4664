// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Storage contract for run-status rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use cadence_jobs_core::{JobType, RunStatusRecord, TenantId};

use crate::error::Result;

/// Durable key space of run-status rows, keyed by
/// `(tenant_id, job_type, schedule_id)`.
#[async_trait]
pub trait StatusStore: Send + Sync {
	/// Insert or refresh each record's row.
	///
	/// `run_id`, `last_run` and `next_run` keep their stored values when the
	/// incoming record leaves them unset.
	async fn upsert_status(&self, records: &[RunStatusRecord]) -> Result<()>;

	/// All rows of `job_type` belonging to any of `tenant_ids`.
	async fn query_status(
		&self,
		job_type: &JobType,
		tenant_ids: &[TenantId],
	) -> Result<Vec<RunStatusRecord>>;

	/// `RUNNING` rows whose `updated_at` is at least `hours_threshold` before `now`.
	async fn query_stuck(
		&self,
		hours_threshold: f64,
		now: DateTime<Utc>,
	) -> Result<Vec<RunStatusRecord>>;

	async fn is_reachable(&self) -> bool;
}
