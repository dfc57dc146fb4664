// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Typed access to the status store.
//!
//! Every status write goes through [`RunStatusRegistry`], which drops updates
//! for job types outside the allow-list and for manual invocations, and
//! applies the store failure policy when the store is unreachable.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use cadence_jobs_core::{
	JobType, JobTypeAllowList, RunStatus, RunStatusRecord, RunStatusUpdate, StoreFailurePolicy,
	TenantId,
};

use crate::error::{Result, StatusError};
use crate::store::StatusStore;

/// Why an update was not written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
	NotAllowListed,
	ManualInvocation,
}

/// Result of a single [`RunStatusRegistry::save`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SaveOutcome {
	Written,
	Skipped { reason: SkipReason },
	/// The store failed and the fail-open policy swallowed the error.
	Degraded { error: String },
}

impl SaveOutcome {
	pub fn is_written(&self) -> bool {
		matches!(self, Self::Written)
	}
}

/// Result of [`RunStatusRegistry::batch_save`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSaveOutcome {
	pub written: usize,
	pub skipped: usize,
	/// Updates rejected by validation; the rest of the batch is still written.
	pub errors: Vec<String>,
	pub degraded: Option<String>,
}

pub struct RunStatusRegistry {
	store: Arc<dyn StatusStore>,
	allow_list: JobTypeAllowList,
	policy: StoreFailurePolicy,
}

impl RunStatusRegistry {
	pub fn new(
		store: Arc<dyn StatusStore>,
		allow_list: JobTypeAllowList,
		policy: StoreFailurePolicy,
	) -> Self {
		Self {
			store,
			allow_list,
			policy,
		}
	}

	pub fn store(&self) -> &Arc<dyn StatusStore> {
		&self.store
	}

	pub fn allow_list(&self) -> &JobTypeAllowList {
		&self.allow_list
	}

	pub fn policy(&self) -> StoreFailurePolicy {
		self.policy
	}

	pub fn tracks(&self, job_type: &JobType) -> bool {
		self.allow_list.allows(job_type.as_str())
	}

	pub async fn save(&self, update: RunStatusUpdate) -> Result<SaveOutcome> {
		self.save_at(update, Utc::now()).await
	}

	#[instrument(skip(self, update), fields(tenant_id = %update.tenant_id, job_type = %update.job_type, status = %update.status))]
	pub async fn save_at(&self, update: RunStatusUpdate, now: DateTime<Utc>) -> Result<SaveOutcome> {
		if let Some(reason) = self.skip_reason(&update) {
			debug!(?reason, "status update skipped");
			return Ok(SaveOutcome::Skipped { reason });
		}
		update.validate()?;

		let record = update.into_record(now);
		if let Some(previous) = self.illegal_transition(&record).await {
			warn!(
				from = %previous,
				to = %record.status,
				schedule_id = ?record.schedule_id,
				"Run status moved outside its lifecycle, writing anyway"
			);
		}
		match self.store.upsert_status(std::slice::from_ref(&record)).await {
			Ok(()) => Ok(SaveOutcome::Written),
			Err(e) => {
				warn!(
					tenant_id = %record.tenant_id,
					job_type = %record.job_type,
					schedule_id = ?record.schedule_id,
					run_id = ?record.run_id,
					status = %record.status,
					error_message = ?record.error_message,
					retry_count = record.retry_count,
					error = %e,
					"Failed to persist run status"
				);
				self.degrade(e).map(|error| SaveOutcome::Degraded { error })
			}
		}
	}

	pub async fn batch_save(&self, updates: Vec<RunStatusUpdate>) -> Result<BatchSaveOutcome> {
		self.batch_save_at(updates, Utc::now()).await
	}

	#[instrument(skip(self, updates), fields(count = updates.len()))]
	pub async fn batch_save_at(
		&self,
		updates: Vec<RunStatusUpdate>,
		now: DateTime<Utc>,
	) -> Result<BatchSaveOutcome> {
		let mut outcome = BatchSaveOutcome::default();
		let mut records = Vec::with_capacity(updates.len());

		for update in updates {
			if self.skip_reason(&update).is_some() {
				outcome.skipped += 1;
				continue;
			}
			if let Err(e) = update.validate() {
				outcome
					.errors
					.push(format!("{}/{}: {e}", update.tenant_id, update.job_type));
				continue;
			}
			records.push(update.into_record(now));
		}

		if records.is_empty() {
			debug!(skipped = outcome.skipped, "nothing to write in status batch");
			return Ok(outcome);
		}

		match self.store.upsert_status(&records).await {
			Ok(()) => {
				outcome.written = records.len();
				Ok(outcome)
			}
			Err(e) => {
				for record in &records {
					warn!(
						tenant_id = %record.tenant_id,
						job_type = %record.job_type,
						status = %record.status,
						"Failed to persist run status in batch"
					);
				}
				warn!(count = records.len(), error = %e, "Status batch write failed");
				outcome.degraded = Some(self.degrade(e)?);
				Ok(outcome)
			}
		}
	}

	/// All rows for `job_type` and `tenant_ids`. Untracked job types have no rows.
	#[instrument(skip(self, tenant_ids), fields(job_type = %job_type, tenants = tenant_ids.len()))]
	pub async fn get(
		&self,
		job_type: &JobType,
		tenant_ids: &[TenantId],
	) -> Result<Vec<RunStatusRecord>> {
		if !self.tracks(job_type) {
			return Ok(Vec::new());
		}

		match self.store.query_status(job_type, tenant_ids).await {
			Ok(records) => Ok(records),
			Err(e) => {
				warn!(error = %e, "Failed to read run status");
				self.degrade(e).map(|_| Vec::new())
			}
		}
	}

	/// The stored status when `record` does not follow it in the lifecycle.
	/// Read failures are ignored; the write that follows reports them.
	pub async fn illegal_transition(&self, record: &RunStatusRecord) -> Option<RunStatus> {
		let rows = self
			.store
			.query_status(&record.job_type, std::slice::from_ref(&record.tenant_id))
			.await
			.ok()?;
		let schedule_id = record.schedule_id.as_deref().unwrap_or("");
		rows.into_iter()
			.find(|row| row.schedule_id.as_deref().unwrap_or("") == schedule_id)
			.map(|row| row.status)
			.filter(|previous| !previous.can_transition_to(record.status))
	}

	fn skip_reason(&self, update: &RunStatusUpdate) -> Option<SkipReason> {
		if !self.tracks(&update.job_type) {
			Some(SkipReason::NotAllowListed)
		} else if update.is_manual_invocation() {
			Some(SkipReason::ManualInvocation)
		} else {
			None
		}
	}

	/// Apply the store failure policy: fail-open keeps the message, fail-closed errors.
	fn degrade(&self, error: StatusError) -> Result<String> {
		if self.policy.is_fail_open() {
			Ok(error.to_string())
		} else {
			Err(StatusError::StoreUnavailable(error.to_string()))
		}
	}
}
