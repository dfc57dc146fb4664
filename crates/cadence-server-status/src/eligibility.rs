// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Minimum-interval check between runs of one job for one tenant.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use cadence_jobs_core::{JobType, RunStatusRecord, TenantId};

use crate::registry::RunStatusRegistry;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EligibilityDecision {
	pub should_run: bool,
	pub reason: String,
	pub last_run: Option<DateTime<Utc>>,
	pub hours_since_last_run: Option<f64>,
}

impl EligibilityDecision {
	fn eligible(reason: impl Into<String>) -> Self {
		Self {
			should_run: true,
			reason: reason.into(),
			last_run: None,
			hours_since_last_run: None,
		}
	}

	fn ineligible(reason: impl Into<String>) -> Self {
		Self {
			should_run: false,
			reason: reason.into(),
			last_run: None,
			hours_since_last_run: None,
		}
	}
}

pub struct RunEligibilityEvaluator {
	registry: Arc<RunStatusRegistry>,
}

impl RunEligibilityEvaluator {
	pub fn new(registry: Arc<RunStatusRegistry>) -> Self {
		Self { registry }
	}

	pub async fn should_run(
		&self,
		job_type: &JobType,
		tenant_id: &TenantId,
		min_hours_between_runs: f64,
	) -> EligibilityDecision {
		self
			.should_run_at(job_type, tenant_id, min_hours_between_runs, Utc::now())
			.await
	}

	/// Never fails: errors resolve according to the store failure policy.
	#[instrument(skip(self), fields(job_type = %job_type, tenant_id = %tenant_id))]
	pub async fn should_run_at(
		&self,
		job_type: &JobType,
		tenant_id: &TenantId,
		min_hours_between_runs: f64,
		now: DateTime<Utc>,
	) -> EligibilityDecision {
		if !min_hours_between_runs.is_finite() {
			warn!(min_hours_between_runs, "Invalid minimum interval, failing open");
			return EligibilityDecision::eligible(format!(
				"invalid minimum interval {min_hours_between_runs}; failing open"
			));
		}
		if !self.registry.tracks(job_type) {
			return EligibilityDecision::eligible("job type not tracked");
		}

		let records = match self
			.registry
			.store()
			.query_status(job_type, std::slice::from_ref(tenant_id))
			.await
		{
			Ok(records) => records,
			Err(e) => {
				warn!(error = %e, "Eligibility check failed to read status");
				return if self.registry.policy().is_fail_open() {
					EligibilityDecision::eligible(format!(
						"status unavailable ({e}); failing open to avoid starving the schedule"
					))
				} else {
					EligibilityDecision::ineligible(format!("status unavailable ({e})"))
				};
			}
		};

		let decision = decide(&records, min_hours_between_runs, now);
		debug!(should_run = decision.should_run, reason = %decision.reason, "eligibility decided");
		decision
	}
}

/// Uses the latest `last_run` across all rows of the pair.
fn decide(records: &[RunStatusRecord], min_hours: f64, now: DateTime<Utc>) -> EligibilityDecision {
	if records.is_empty() {
		return EligibilityDecision::eligible("never scheduled");
	}
	let Some(last_run) = records.iter().filter_map(|r| r.last_run).max() else {
		return EligibilityDecision::eligible("scheduled but never executed");
	};

	let hours = cadence_jobs_core::record::hours_between(last_run, now);
	let should_run = hours >= min_hours;
	let reason = if should_run {
		format!("{hours:.2}h since last run, minimum is {min_hours}h")
	} else {
		format!("only {hours:.2}h since last run, minimum is {min_hours}h")
	};

	EligibilityDecision {
		should_run,
		reason,
		last_run: Some(last_run),
		hours_since_last_run: Some(hours),
	}
}
