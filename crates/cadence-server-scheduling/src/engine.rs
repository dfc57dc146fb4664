// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Contract with the external workflow engine that actually runs jobs.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use serde::Serialize;

use cadence_jobs_core::{JobType, TenantId};

use crate::error::{Result, SchedulingError};

/// Starts runs and registers recurring schedules with the workflow engine.
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
	/// Start one run and return the engine's run identifier.
	async fn start_run(
		&self,
		job_type: &JobType,
		tenant_id: &TenantId,
		args: serde_json::Value,
	) -> Result<String>;

	/// Register a cron-triggered schedule and return its identifier.
	async fn create_recurring_schedule(&self, schedule: &RecurringSchedule) -> Result<String>;
}

/// A validated cron schedule for one job type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecurringSchedule {
	pub cron_expression: String,
	pub timezone: String,
	pub job_type: JobType,
	pub args: serde_json::Value,
}

impl RecurringSchedule {
	pub fn new(
		cron_expression: impl Into<String>,
		timezone: impl Into<String>,
		job_type: impl Into<JobType>,
		args: serde_json::Value,
	) -> Result<Self> {
		let cron_expression = cron_expression.into();
		let timezone = timezone.into();
		validate_cron_expression(&cron_expression)?;
		validate_timezone(&timezone)?;
		Ok(Self {
			cron_expression,
			timezone,
			job_type: job_type.into(),
			args,
		})
	}

	/// The next firing strictly after `after`.
	pub fn next_after(&self, after: DateTime<Utc>) -> Result<DateTime<Utc>> {
		next_fire_after(&self.cron_expression, &self.timezone, after)
	}
}

/// Widen a 5-field Unix expression to the 7-field form of the `cron` crate.
fn to_cron_crate_format(expression: &str) -> String {
	match expression.split_whitespace().count() {
		5 => format!("0 {} *", expression.trim()),
		_ => expression.trim().to_string(),
	}
}

fn parse_schedule(expression: &str) -> Result<Schedule> {
	Schedule::from_str(&to_cron_crate_format(expression))
		.map_err(|e| SchedulingError::InvalidCronExpression(format!("{expression}: {e}")))
}

fn parse_timezone(timezone: &str) -> Result<Tz> {
	timezone
		.parse()
		.map_err(|_| SchedulingError::InvalidTimezone(timezone.to_string()))
}

pub fn validate_cron_expression(expression: &str) -> Result<()> {
	parse_schedule(expression).map(|_| ())
}

pub fn validate_timezone(timezone: &str) -> Result<()> {
	parse_timezone(timezone).map(|_| ())
}

pub fn next_fire_after(expression: &str, timezone: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>> {
	let schedule = parse_schedule(expression)?;
	let tz = parse_timezone(timezone)?;
	schedule
		.after(&after.with_timezone(&tz))
		.next()
		.map(|next| next.with_timezone(&Utc))
		.ok_or_else(|| SchedulingError::Internal(format!("cron expression {expression} never fires")))
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	#[test]
	fn test_five_field_expression_is_widened() {
		assert_eq!(to_cron_crate_format("0 9 * * 1-5"), "0 0 9 * * 1-5 *");
		assert_eq!(to_cron_crate_format("0 0 9 * * Mon *"), "0 0 9 * * Mon *");
	}

	#[test]
	fn test_invalid_cron_expression() {
		let result = validate_cron_expression("every morning");
		assert!(matches!(result, Err(SchedulingError::InvalidCronExpression(_))));
	}

	#[test]
	fn test_invalid_timezone() {
		assert!(matches!(
			validate_timezone("Mars/Olympus"),
			Err(SchedulingError::InvalidTimezone(_))
		));
		assert!(validate_timezone("Europe/Berlin").is_ok());
	}

	#[test]
	fn test_hourly_schedule_next_run() {
		let schedule =
			RecurringSchedule::new("0 * * * *", "UTC", "email-sync", serde_json::Value::Null).unwrap();
		let after = Utc.with_ymd_and_hms(2026, 3, 2, 10, 15, 0).unwrap();
		assert_eq!(
			schedule.next_after(after).unwrap(),
			Utc.with_ymd_and_hms(2026, 3, 2, 11, 0, 0).unwrap()
		);
	}

	#[test]
	fn test_next_run_in_tenant_timezone() {
		// 09:00 in Sydney (UTC+11 in January) is 22:00 UTC the day before.
		let after = Utc.with_ymd_and_hms(2026, 1, 19, 20, 0, 0).unwrap();
		let next = next_fire_after("0 9 * * *", "Australia/Sydney", after).unwrap();
		assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 19, 22, 0, 0).unwrap());
	}

	#[test]
	fn test_recurring_schedule_rejects_bad_input() {
		assert!(RecurringSchedule::new("* *", "UTC", "email-sync", serde_json::Value::Null).is_err());
		assert!(RecurringSchedule::new("0 * * * *", "Nowhere", "email-sync", serde_json::Value::Null).is_err());
	}
}
