// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fleet-wide health of every monitored job type across all tenants.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use cadence_jobs_core::{JobType, RunStatus, RunStatusRecord, TenantId};
use cadence_server_status::StatusStore;

pub const DEFAULT_STUCK_AFTER_HOURS: f64 = 2.0;
pub const DEFAULT_OVERDUE_AFTER_HOURS: f64 = 24.0;

const STUCK_ATTENTION_THRESHOLD: usize = 3;
const ISSUE_ATTENTION_THRESHOLD: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
	Warning,
	Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
	Stuck,
	Failed,
	Overdue,
	DatabaseUnavailable,
}

/// Classification of one status row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowHealth {
	Healthy,
	Pending,
	Stuck,
	Failed,
	Overdue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthIssue {
	pub kind: IssueKind,
	pub severity: Severity,
	pub tenant_id: Option<TenantId>,
	pub job_type: Option<JobType>,
	pub message: String,
	pub error_message: Option<String>,
	/// Hours running for stuck rows, hours since last run for overdue rows.
	pub hours: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetHealthReport {
	pub checked_at: DateTime<Utc>,
	pub total_tenants: usize,
	pub total_workflows: usize,
	pub healthy_workflows: usize,
	pub pending_workflows: usize,
	pub stuck_workflows: usize,
	pub failed_workflows: usize,
	pub overdue_workflows: usize,
	pub issues: Vec<HealthIssue>,
	pub recommendations: Vec<String>,
	pub needs_attention: bool,
}

impl FleetHealthReport {
	fn empty(checked_at: DateTime<Utc>, total_tenants: usize) -> Self {
		Self {
			checked_at,
			total_tenants,
			total_workflows: 0,
			healthy_workflows: 0,
			pending_workflows: 0,
			stuck_workflows: 0,
			failed_workflows: 0,
			overdue_workflows: 0,
			issues: Vec::new(),
			recommendations: Vec::new(),
			needs_attention: false,
		}
	}

	fn database_unavailable(checked_at: DateTime<Utc>, total_tenants: usize, error: String) -> Self {
		let mut report = Self::empty(checked_at, total_tenants);
		report.issues.push(HealthIssue {
			kind: IssueKind::DatabaseUnavailable,
			severity: Severity::Critical,
			tenant_id: None,
			job_type: None,
			message: format!("status database unavailable: {error}"),
			error_message: Some(error),
			hours: None,
		});
		report
			.recommendations
			.push("Restore connectivity to the status database".to_string());
		report.needs_attention = true;
		report
	}

	pub fn has_critical_issues(&self) -> bool {
		self.issues.iter().any(|i| i.severity == Severity::Critical)
	}

	fn record(&mut self, health: WorkflowHealth) {
		self.total_workflows += 1;
		match health {
			WorkflowHealth::Healthy => self.healthy_workflows += 1,
			WorkflowHealth::Pending => self.pending_workflows += 1,
			WorkflowHealth::Stuck => self.stuck_workflows += 1,
			WorkflowHealth::Failed => self.failed_workflows += 1,
			WorkflowHealth::Overdue => self.overdue_workflows += 1,
		}
	}

	fn finish(&mut self) {
		if self.failed_workflows > 0 {
			self.recommendations.push(format!(
				"Investigate {} failed workflow(s)",
				self.failed_workflows
			));
		}
		if self.stuck_workflows > 0 {
			self.recommendations.push(format!(
				"Review {} stuck workflow(s); the stuck-run sweep resets them to FAILED",
				self.stuck_workflows
			));
		}
		if self.overdue_workflows > 0 {
			self.recommendations.push(format!(
				"Check the schedules of {} overdue workflow(s)",
				self.overdue_workflows
			));
		}
		if self.pending_workflows > 0 {
			self.recommendations.push(format!(
				"{} workflow(s) have not reported a status yet",
				self.pending_workflows
			));
		}

		self.needs_attention = self.failed_workflows > 0
			|| self.stuck_workflows > STUCK_ATTENTION_THRESHOLD
			|| self.issues.len() > ISSUE_ATTENTION_THRESHOLD;
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthThresholds {
	pub stuck_after_hours: f64,
	pub overdue_after_hours: f64,
}

impl Default for HealthThresholds {
	fn default() -> Self {
		Self {
			stuck_after_hours: DEFAULT_STUCK_AFTER_HOURS,
			overdue_after_hours: DEFAULT_OVERDUE_AFTER_HOURS,
		}
	}
}

pub struct FleetHealthAggregator {
	store: Arc<dyn StatusStore>,
	thresholds: HealthThresholds,
}

impl FleetHealthAggregator {
	pub fn new(store: Arc<dyn StatusStore>, thresholds: HealthThresholds) -> Self {
		Self { store, thresholds }
	}

	pub async fn scan(&self, job_types: &[JobType], tenant_ids: &[TenantId]) -> FleetHealthReport {
		self.scan_at(job_types, tenant_ids, Utc::now()).await
	}

	/// Classify every (job type, tenant) pair.
	///
	/// A tenant without any row for a job type counts as one pending workflow.
	/// Each existing row, one per schedule, is classified on its own.
	#[instrument(skip(self, job_types, tenant_ids), fields(job_types = job_types.len(), tenants = tenant_ids.len()))]
	pub async fn scan_at(
		&self,
		job_types: &[JobType],
		tenant_ids: &[TenantId],
		now: DateTime<Utc>,
	) -> FleetHealthReport {
		if !self.store.is_reachable().await {
			warn!("Status store unreachable during fleet health scan");
			return FleetHealthReport::database_unavailable(
				now,
				tenant_ids.len(),
				"store is not reachable".to_string(),
			);
		}

		let mut report = FleetHealthReport::empty(now, tenant_ids.len());
		for job_type in job_types {
			let records = match self.store.query_status(job_type, tenant_ids).await {
				Ok(records) => records,
				Err(e) => {
					warn!(job_type = %job_type, error = %e, "Fleet health scan failed to read status");
					return FleetHealthReport::database_unavailable(now, tenant_ids.len(), e.to_string());
				}
			};

			let seen: HashSet<&TenantId> = records.iter().map(|r| &r.tenant_id).collect();
			let pending = tenant_ids.iter().filter(|t| !seen.contains(t)).count();
			for _ in 0..pending {
				report.record(WorkflowHealth::Pending);
			}

			for record in &records {
				let health = classify(record, now, &self.thresholds);
				report.record(health);
				if let Some(issue) = issue_for(record, health, now) {
					report.issues.push(issue);
				}
			}
		}
		report.finish();

		if report.needs_attention {
			warn!(
				failed = report.failed_workflows,
				stuck = report.stuck_workflows,
				overdue = report.overdue_workflows,
				issues = report.issues.len(),
				"Fleet needs attention"
			);
		} else {
			info!(
				workflows = report.total_workflows,
				healthy = report.healthy_workflows,
				pending = report.pending_workflows,
				issues = report.issues.len(),
				"Fleet health scan finished"
			);
		}
		report
	}
}

/// Precedence: stuck, failed, overdue, healthy.
pub fn classify(record: &RunStatusRecord, now: DateTime<Utc>, thresholds: &HealthThresholds) -> WorkflowHealth {
	if record.status == RunStatus::Running && record.hours_since_update(now) > thresholds.stuck_after_hours {
		return WorkflowHealth::Stuck;
	}
	if record.status == RunStatus::Failed {
		return WorkflowHealth::Failed;
	}
	match record.hours_since_last_run(now) {
		Some(hours) if hours > thresholds.overdue_after_hours => WorkflowHealth::Overdue,
		_ => WorkflowHealth::Healthy,
	}
}

fn issue_for(record: &RunStatusRecord, health: WorkflowHealth, now: DateTime<Utc>) -> Option<HealthIssue> {
	let (kind, severity, message, hours) = match health {
		WorkflowHealth::Healthy | WorkflowHealth::Pending => return None,
		WorkflowHealth::Stuck => {
			let hours = record.hours_since_update(now);
			(
				IssueKind::Stuck,
				Severity::Warning,
				format!("{} RUNNING for {hours:.1}h", record.job_type),
				Some(hours),
			)
		}
		WorkflowHealth::Failed => (
			IssueKind::Failed,
			Severity::Critical,
			format!("{} last run FAILED", record.job_type),
			None,
		),
		WorkflowHealth::Overdue => {
			let hours = record.hours_since_last_run(now);
			(
				IssueKind::Overdue,
				Severity::Warning,
				format!(
					"{} has not run for {:.1}h",
					record.job_type,
					hours.unwrap_or_default()
				),
				hours,
			)
		}
	};

	Some(HealthIssue {
		kind,
		severity,
		tenant_id: Some(record.tenant_id.clone()),
		job_type: Some(record.job_type.clone()),
		message,
		error_message: record.error_message.clone(),
		hours,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{create_test_store, seed};
	use chrono::{Duration, TimeZone};

	fn now() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap()
	}

	fn tenants(n: usize) -> Vec<TenantId> {
		(1..=n).map(|i| TenantId::new(format!("site-{i}"))).collect()
	}

	fn email_sync() -> Vec<JobType> {
		vec![JobType::new("email-sync")]
	}

	#[tokio::test]
	async fn test_fleet_with_failures_and_stuck_run_needs_attention() {
		let (_pool, store) = create_test_store().await;
		seed(&store, "site-1", "email-sync", RunStatus::Failed, now() - Duration::hours(1)).await;
		seed(&store, "site-2", "email-sync", RunStatus::Failed, now() - Duration::hours(2)).await;
		seed(&store, "site-3", "email-sync", RunStatus::Running, now() - Duration::hours(3)).await;
		seed(&store, "site-4", "email-sync", RunStatus::Completed, now() - Duration::hours(1)).await;
		seed(&store, "site-5", "email-sync", RunStatus::Completed, now() - Duration::hours(4)).await;

		let aggregator = FleetHealthAggregator::new(store, HealthThresholds::default());
		let report = aggregator.scan_at(&email_sync(), &tenants(5), now()).await;

		assert_eq!(report.total_workflows, 5);
		assert_eq!(report.failed_workflows, 2);
		assert_eq!(report.stuck_workflows, 1);
		assert_eq!(report.healthy_workflows, 2);
		assert_eq!(report.issues.len(), 3);
		assert!(report.needs_attention);
		assert!(report
			.recommendations
			.contains(&"Investigate 2 failed workflow(s)".to_string()));
	}

	#[tokio::test]
	async fn test_missing_rows_are_pending() {
		let (_pool, store) = create_test_store().await;
		seed(&store, "site-1", "email-sync", RunStatus::Completed, now() - Duration::hours(1)).await;

		let aggregator = FleetHealthAggregator::new(store, HealthThresholds::default());
		let report = aggregator.scan_at(&email_sync(), &tenants(3), now()).await;

		assert_eq!(report.pending_workflows, 2);
		assert_eq!(report.healthy_workflows, 1);
		assert!(report.issues.is_empty());
		assert!(!report.needs_attention);
	}

	#[tokio::test]
	async fn test_overdue_and_recent_running() {
		let (_pool, store) = create_test_store().await;
		seed(&store, "site-1", "email-sync", RunStatus::Completed, now() - Duration::hours(30)).await;
		seed(&store, "site-2", "email-sync", RunStatus::Running, now() - Duration::hours(1)).await;

		let aggregator = FleetHealthAggregator::new(store, HealthThresholds::default());
		let report = aggregator.scan_at(&email_sync(), &tenants(2), now()).await;

		assert_eq!(report.overdue_workflows, 1);
		assert_eq!(report.healthy_workflows, 1);
		assert_eq!(report.issues[0].kind, IssueKind::Overdue);
		assert_eq!(report.issues[0].severity, Severity::Warning);
		assert!(!report.needs_attention);
	}

	#[tokio::test]
	async fn test_many_warnings_need_attention() {
		let (_pool, store) = create_test_store().await;
		for i in 1..=6 {
			seed(
				&store,
				&format!("site-{i}"),
				"email-sync",
				RunStatus::Completed,
				now() - Duration::hours(48),
			)
			.await;
		}

		let aggregator = FleetHealthAggregator::new(store, HealthThresholds::default());
		let report = aggregator.scan_at(&email_sync(), &tenants(6), now()).await;

		assert_eq!(report.overdue_workflows, 6);
		assert!(report.needs_attention);
	}

	#[tokio::test]
	async fn test_store_outage_is_single_critical_issue() {
		let (pool, store) = create_test_store().await;
		pool.close().await;

		let aggregator = FleetHealthAggregator::new(store, HealthThresholds::default());
		let report = aggregator.scan_at(&email_sync(), &tenants(5), now()).await;

		assert_eq!(report.issues.len(), 1);
		assert_eq!(report.issues[0].kind, IssueKind::DatabaseUnavailable);
		assert_eq!(report.issues[0].severity, Severity::Critical);
		assert!(report.needs_attention);
		assert!(report.has_critical_issues());
	}

	#[test]
	fn test_stuck_takes_precedence_over_overdue() {
		let record = RunStatusRecord {
			tenant_id: TenantId::new("site-1"),
			job_type: JobType::new("email-sync"),
			schedule_id: None,
			run_id: None,
			status: RunStatus::Running,
			last_run: Some(now() - Duration::hours(72)),
			next_run: None,
			error_message: None,
			retry_count: 0,
			updated_at: now() - Duration::hours(5),
		};
		assert_eq!(
			classify(&record, now(), &HealthThresholds::default()),
			WorkflowHealth::Stuck
		);
	}

	#[test]
	fn test_failed_carries_error_message() {
		let record = RunStatusRecord {
			tenant_id: TenantId::new("site-1"),
			job_type: JobType::new("email-sync"),
			schedule_id: None,
			run_id: None,
			status: RunStatus::Failed,
			last_run: Some(now()),
			next_run: None,
			error_message: Some("smtp timeout".to_string()),
			retry_count: 1,
			updated_at: now(),
		};
		let issue = issue_for(&record, WorkflowHealth::Failed, now()).unwrap();
		assert_eq!(issue.severity, Severity::Critical);
		assert_eq!(issue.error_message.as_deref(), Some("smtp timeout"));
	}
}
