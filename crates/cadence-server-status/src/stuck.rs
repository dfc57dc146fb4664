// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Recovery of runs left in `RUNNING` after their execution died.
//!
//! The same reset is used by the periodic sweep over all tenants and by the
//! pre-flight guard that runs right before a new run of one (job, tenant)
//! pair is started.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use cadence_jobs_core::record::stuck_reset_message;
use cadence_jobs_core::{JobType, RunStatus, RunStatusRecord, RunStatusUpdate, TenantId};

use crate::error::{Result, StatusError};
use crate::registry::{RunStatusRegistry, SaveOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepFailure {
	pub tenant_id: TenantId,
	pub job_type: JobType,
	pub schedule_id: Option<String>,
	pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
	pub cleaned: usize,
	pub errors: Vec<SweepFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardDecision {
	pub can_proceed: bool,
	pub reason: String,
	/// Stuck records reset by this check.
	pub reset: usize,
	/// Age of the oldest `RUNNING` record seen, if any.
	pub hours_stuck: Option<f64>,
}

impl GuardDecision {
	fn proceed(reason: impl Into<String>) -> Self {
		Self {
			can_proceed: true,
			reason: reason.into(),
			reset: 0,
			hours_stuck: None,
		}
	}
}

pub struct StuckExecutionDetector {
	registry: Arc<RunStatusRegistry>,
}

impl StuckExecutionDetector {
	pub fn new(registry: Arc<RunStatusRegistry>) -> Self {
		Self { registry }
	}

	pub async fn sweep(&self, hours_threshold: f64) -> Result<SweepReport> {
		self.sweep_at(hours_threshold, Utc::now()).await
	}

	/// Reset every `RUNNING` record not updated for `hours_threshold` hours.
	///
	/// Fails only when the stuck records cannot be listed. A failed reset is
	/// recorded in the report and the sweep moves on.
	#[instrument(skip(self))]
	pub async fn sweep_at(&self, hours_threshold: f64, now: DateTime<Utc>) -> Result<SweepReport> {
		validate_threshold(hours_threshold)?;

		let stuck = self
			.registry
			.store()
			.query_stuck(hours_threshold, now)
			.await
			.map_err(|e| StatusError::StoreUnavailable(e.to_string()))?;

		let mut report = SweepReport::default();
		for record in stuck {
			match self.reset(&record, hours_threshold, now).await {
				Ok(()) => report.cleaned += 1,
				Err(e) => {
					warn!(
						tenant_id = %record.tenant_id,
						job_type = %record.job_type,
						error = %e,
						"Failed to reset stuck run"
					);
					report.errors.push(SweepFailure {
						tenant_id: record.tenant_id.clone(),
						job_type: record.job_type.clone(),
						schedule_id: record.schedule_id.clone(),
						error: e.to_string(),
					});
				}
			}
		}

		if report.cleaned > 0 || !report.errors.is_empty() {
			info!(
				cleaned = report.cleaned,
				failed = report.errors.len(),
				hours_threshold,
				"Stuck run sweep finished"
			);
		}
		Ok(report)
	}

	pub async fn guard(
		&self,
		job_type: &JobType,
		tenant_id: &TenantId,
		hours_threshold: f64,
	) -> GuardDecision {
		self
			.guard_at(job_type, tenant_id, hours_threshold, Utc::now())
			.await
	}

	/// Pre-flight check before starting a run.
	///
	/// Blocks only when a `RUNNING` record younger than `hours_threshold`
	/// exists. Stuck records are reset and the caller may proceed.
	#[instrument(skip(self), fields(job_type = %job_type, tenant_id = %tenant_id))]
	pub async fn guard_at(
		&self,
		job_type: &JobType,
		tenant_id: &TenantId,
		hours_threshold: f64,
		now: DateTime<Utc>,
	) -> GuardDecision {
		if !self.registry.tracks(job_type) {
			return GuardDecision::proceed("job type not tracked");
		}
		// Nothing is read or reset with an unusable threshold.
		if let Err(e) = validate_threshold(hours_threshold) {
			warn!(hours_threshold, error = %e, "Guard skipped, proceeding without checks");
			return GuardDecision::proceed(format!("guard skipped: {e}"));
		}

		let records = match self
			.registry
			.store()
			.query_status(job_type, std::slice::from_ref(tenant_id))
			.await
		{
			Ok(records) => records,
			Err(e) => {
				warn!(error = %e, "Guard failed to read status");
				if self.registry.policy().is_fail_open() {
					return GuardDecision::proceed(format!(
						"status unavailable ({e}); proceeding optimistically"
					));
				}
				return GuardDecision {
					can_proceed: false,
					reason: format!("status unavailable ({e})"),
					reset: 0,
					hours_stuck: None,
				};
			}
		};

		let mut running: Vec<&RunStatusRecord> = records
			.iter()
			.filter(|r| r.status == RunStatus::Running)
			.collect();
		if running.is_empty() {
			return match records.iter().max_by_key(|r| r.updated_at) {
				None => GuardDecision::proceed("no existing record"),
				Some(latest) => GuardDecision::proceed(format!("last status is {}", latest.status)),
			};
		}
		// Most recently updated first.
		running.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
		let hours_stuck = running
			.iter()
			.map(|r| r.hours_since_update(now))
			.fold(None, |acc: Option<f64>, h| Some(acc.map_or(h, |a| a.max(h))));

		if let Some(active) = running.iter().find(|r| !r.is_stuck(now, hours_threshold)) {
			let hours = active.hours_since_update(now);
			info!(
				run_id = ?active.run_id,
				hours_running = hours,
				"Active run in progress, not starting another"
			);
			return GuardDecision {
				can_proceed: false,
				reason: format!(
					"run {} active for {hours:.2}h, below stuck threshold of {hours_threshold}h",
					active.run_id.as_deref().unwrap_or("<unknown>")
				),
				reset: 0,
				hours_stuck,
			};
		}

		let mut reset = 0;
		for record in running {
			match self.reset(record, hours_threshold, now).await {
				Ok(()) => reset += 1,
				// The old execution is dead either way.
				Err(e) => warn!(error = %e, "Guard failed to reset stuck run, proceeding"),
			}
		}

		GuardDecision {
			can_proceed: true,
			reason: format!("reset {reset} stuck run(s) older than {hours_threshold}h"),
			reset,
			hours_stuck,
		}
	}

	async fn reset(
		&self,
		record: &RunStatusRecord,
		hours_threshold: f64,
		now: DateTime<Utc>,
	) -> Result<()> {
		let mut update = RunStatusUpdate::new(
			record.tenant_id.clone(),
			record.job_type.clone(),
			RunStatus::Failed,
		)
		.with_error(stuck_reset_message(hours_threshold))
		.with_retry_count(record.retry_count.saturating_add(1));
		update.schedule_id = record.schedule_id.clone();
		update.run_id = record.run_id.clone();

		match self.registry.save_at(update, now).await? {
			SaveOutcome::Written => {
				info!(
					tenant_id = %record.tenant_id,
					job_type = %record.job_type,
					run_id = ?record.run_id,
					hours_running = record.hours_since_update(now),
					"Reset stuck run to FAILED"
				);
				Ok(())
			}
			SaveOutcome::Skipped { reason } => {
				Err(StatusError::Internal(format!("reset skipped: {reason:?}")))
			}
			SaveOutcome::Degraded { error } => Err(StatusError::StoreUnavailable(error)),
		}
	}
}

fn validate_threshold(hours_threshold: f64) -> Result<()> {
	if hours_threshold.is_finite() && hours_threshold > 0.0 {
		Ok(())
	} else {
		Err(StatusError::Validation(format!(
			"hours threshold must be positive, got {hours_threshold}"
		)))
	}
}
