// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Run-status records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{JobsCoreError, Result};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Schedule identifier used by manual (non-cron) invocations.
pub const MANUAL_SCHEDULE_ID: &str = "manual";

/// Identifier of a tenant ("site").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl TenantId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for TenantId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for TenantId {
	fn from(s: &str) -> Self {
		Self(s.to_string())
	}
}

impl From<String> for TenantId {
	fn from(s: String) -> Self {
		Self(s)
	}
}

/// Name of a unit of recurring work, e.g. `email-sync`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobType(pub String);

impl JobType {
	pub fn new(name: impl Into<String>) -> Self {
		Self(name.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for JobType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for JobType {
	fn from(s: &str) -> Self {
		Self(s.to_string())
	}
}

impl From<String> for JobType {
	fn from(s: String) -> Self {
		Self(s)
	}
}

/// Run status of a (tenant, job type) pair.
///
/// Lifecycle: `Scheduled -> Running -> {Completed, Failed}`. A failed run may
/// be retried, moving it back to `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
	Scheduled,
	Running,
	Completed,
	Failed,
}

impl RunStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Scheduled => "SCHEDULED",
			Self::Running => "RUNNING",
			Self::Completed => "COMPLETED",
			Self::Failed => "FAILED",
		}
	}

	/// Terminal statuses stamp `last_run`.
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Completed | Self::Failed)
	}

	/// Whether moving from `self` to `next` follows the record lifecycle.
	///
	/// Completed records go back to `Scheduled` or `Running` when the next run
	/// of the same job begins. A run can fail from any state, including before
	/// it starts.
	pub fn can_transition_to(&self, next: RunStatus) -> bool {
		match (self, next) {
			(_, Self::Failed) => true,
			(Self::Scheduled, Self::Running) => true,
			(Self::Running, Self::Completed | Self::Failed) => true,
			(Self::Failed, Self::Running | Self::Scheduled) => true,
			(Self::Completed, Self::Running | Self::Scheduled) => true,
			(a, b) => *a == b,
		}
	}
}

impl fmt::Display for RunStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for RunStatus {
	type Err = JobsCoreError;

	fn from_str(s: &str) -> Result<Self> {
		match s.to_ascii_uppercase().as_str() {
			"SCHEDULED" => Ok(Self::Scheduled),
			"RUNNING" => Ok(Self::Running),
			"COMPLETED" => Ok(Self::Completed),
			"FAILED" => Ok(Self::Failed),
			_ => Err(JobsCoreError::InvalidStatus(s.to_string())),
		}
	}
}

/// The current status row of one (tenant, job type[, schedule]) key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatusRecord {
	pub tenant_id: TenantId,
	pub job_type: JobType,
	/// Distinguishes several schedules of the same job type for one tenant.
	pub schedule_id: Option<String>,
	/// Workflow execution identifier of the latest run.
	pub run_id: Option<String>,
	pub status: RunStatus,
	/// Last terminal transition; `None` if the job never finished a run.
	pub last_run: Option<DateTime<Utc>>,
	pub next_run: Option<DateTime<Utc>>,
	pub error_message: Option<String>,
	pub retry_count: u32,
	pub updated_at: DateTime<Utc>,
}

impl RunStatusRecord {
	/// Fractional hours since the row was last written.
	pub fn hours_since_update(&self, now: DateTime<Utc>) -> f64 {
		hours_between(self.updated_at, now)
	}

	/// Fractional hours since the last terminal transition.
	pub fn hours_since_last_run(&self, now: DateTime<Utc>) -> Option<f64> {
		self.last_run.map(|last| hours_between(last, now))
	}

	/// A record is stuck when it has been `Running` for at least `threshold_hours`.
	pub fn is_stuck(&self, now: DateTime<Utc>, threshold_hours: f64) -> bool {
		self.status == RunStatus::Running && self.hours_since_update(now) >= threshold_hours
	}
}

/// Fractional hours elapsed from `from` to `to`.
pub fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
	(to - from).num_milliseconds() as f64 / MILLIS_PER_HOUR
}

/// Message written when a stuck `Running` record is reset to `Failed`.
pub fn stuck_reset_message(threshold_hours: f64) -> String {
	format!(
		"Auto-reset from stuck RUNNING state after {}h by preventive cleanup",
		threshold_hours
	)
}

/// A requested status write.
///
/// Optional fields left as `None` are resolved when the update is turned into
/// a record: see [`RunStatusUpdate::into_record`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatusUpdate {
	pub tenant_id: TenantId,
	pub job_type: JobType,
	pub status: RunStatus,
	pub run_id: Option<String>,
	pub schedule_id: Option<String>,
	pub last_run: Option<DateTime<Utc>>,
	pub next_run: Option<DateTime<Utc>>,
	pub error_message: Option<String>,
	pub retry_count: Option<u32>,
}

impl RunStatusUpdate {
	pub fn new(tenant_id: impl Into<TenantId>, job_type: impl Into<JobType>, status: RunStatus) -> Self {
		Self {
			tenant_id: tenant_id.into(),
			job_type: job_type.into(),
			status,
			run_id: None,
			schedule_id: None,
			last_run: None,
			next_run: None,
			error_message: None,
			retry_count: None,
		}
	}

	pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
		self.run_id = Some(run_id.into());
		self
	}

	pub fn with_schedule_id(mut self, schedule_id: impl Into<String>) -> Self {
		self.schedule_id = Some(schedule_id.into());
		self
	}

	pub fn with_last_run(mut self, last_run: DateTime<Utc>) -> Self {
		self.last_run = Some(last_run);
		self
	}

	pub fn with_next_run(mut self, next_run: DateTime<Utc>) -> Self {
		self.next_run = Some(next_run);
		self
	}

	pub fn with_error(mut self, message: impl Into<String>) -> Self {
		self.error_message = Some(message.into());
		self
	}

	pub fn with_retry_count(mut self, retry_count: u32) -> Self {
		self.retry_count = Some(retry_count);
		self
	}

	/// Manual invocations carry a `manual` schedule id (or `manual-<suffix>`).
	pub fn is_manual_invocation(&self) -> bool {
		self.schedule_id.as_deref().is_some_and(|id| {
			id == MANUAL_SCHEDULE_ID || id.starts_with(&format!("{MANUAL_SCHEDULE_ID}-"))
		})
	}

	/// Reject malformed updates before anything is written.
	pub fn validate(&self) -> Result<()> {
		if self.tenant_id.as_str().trim().is_empty() {
			return Err(JobsCoreError::Validation("tenant_id must not be empty".to_string()));
		}
		if self.job_type.as_str().trim().is_empty() {
			return Err(JobsCoreError::Validation("job_type must not be empty".to_string()));
		}
		if self.error_message.is_some() && self.status != RunStatus::Failed {
			return Err(JobsCoreError::Validation(format!(
				"error_message is only allowed with status FAILED, got {}",
				self.status
			)));
		}
		Ok(())
	}

	/// Resolve defaults and produce the row to upsert.
	///
	/// - `last_run` defaults to `now` for terminal statuses.
	/// - `retry_count` defaults to 1 when an error is present, 0 otherwise.
	pub fn into_record(self, now: DateTime<Utc>) -> RunStatusRecord {
		let last_run = match self.last_run {
			Some(explicit) => Some(explicit),
			None if self.status.is_terminal() => Some(now),
			None => None,
		};
		let retry_count = self
			.retry_count
			.unwrap_or(if self.error_message.is_some() { 1 } else { 0 });

		RunStatusRecord {
			tenant_id: self.tenant_id,
			job_type: self.job_type,
			schedule_id: self.schedule_id,
			run_id: self.run_id,
			status: self.status,
			last_run,
			next_run: self.next_run,
			error_message: self.error_message,
			retry_count,
			updated_at: now,
		}
	}
}
