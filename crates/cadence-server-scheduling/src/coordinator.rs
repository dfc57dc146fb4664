// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! One scheduling tick for a job type: decide, guard, start, record.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use cadence_jobs_core::{JobType, RunStatus, RunStatusUpdate, TenantBusinessHours, TenantId};
use cadence_server_status::{
	RunEligibilityEvaluator, RunStatusRegistry, SaveOutcome, StuckExecutionDetector,
};

use crate::business_hours::{BusinessHoursScheduler, ScheduleDecision};
use crate::directory::{load_tenant_hours, TenantDirectory};
use crate::engine::WorkflowEngine;
use crate::error::Result;

pub const DEFAULT_GUARD_THRESHOLD_HOURS: f64 = 6.0;

#[derive(Debug, Clone)]
pub struct TriggerOptions {
	/// Skip tenants whose last run is more recent than this.
	pub min_hours_between_runs: Option<f64>,
	pub guard_threshold_hours: f64,
	/// Passed through to the workflow engine.
	pub args: serde_json::Value,
}

impl Default for TriggerOptions {
	fn default() -> Self {
		Self {
			min_hours_between_runs: None,
			guard_threshold_hours: DEFAULT_GUARD_THRESHOLD_HOURS,
			args: serde_json::Value::Null,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TenantRunOutcome {
	Started { run_id: String },
	NotEligible { reason: String },
	/// An active run of the same job is still in progress.
	Blocked { reason: String },
	Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantTriggerResult {
	pub tenant_id: TenantId,
	#[serde(flatten)]
	pub outcome: TenantRunOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerReport {
	pub job_type: JobType,
	pub decision: ScheduleDecision,
	pub results: Vec<TenantTriggerResult>,
}

impl TriggerReport {
	pub fn started(&self) -> usize {
		self
			.results
			.iter()
			.filter(|r| matches!(r.outcome, TenantRunOutcome::Started { .. }))
			.count()
	}

	pub fn failures(&self) -> impl Iterator<Item = &TenantTriggerResult> {
		self
			.results
			.iter()
			.filter(|r| matches!(r.outcome, TenantRunOutcome::Failed { .. }))
	}
}

/// How a run ended, as reported by the workflow engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
	Completed,
	Failed { error: String },
}

pub struct TriggerCoordinator {
	directory: Arc<dyn TenantDirectory>,
	engine: Arc<dyn WorkflowEngine>,
	registry: Arc<RunStatusRegistry>,
	scheduler: BusinessHoursScheduler,
	evaluator: RunEligibilityEvaluator,
	detector: StuckExecutionDetector,
}

impl TriggerCoordinator {
	pub fn new(
		directory: Arc<dyn TenantDirectory>,
		engine: Arc<dyn WorkflowEngine>,
		registry: Arc<RunStatusRegistry>,
		scheduler: BusinessHoursScheduler,
	) -> Self {
		Self {
			directory,
			engine,
			evaluator: RunEligibilityEvaluator::new(Arc::clone(&registry)),
			detector: StuckExecutionDetector::new(Arc::clone(&registry)),
			registry,
			scheduler,
		}
	}

	/// Schedule decision over every tenant in the directory.
	pub async fn decide_at(&self, now: DateTime<Utc>) -> Result<ScheduleDecision> {
		let tenants = self.load_tenants().await?;
		Ok(self.scheduler.decide(now, &tenants))
	}

	pub async fn trigger(&self, job_type: &JobType, options: &TriggerOptions) -> Result<TriggerReport> {
		self.trigger_at(job_type, options, Utc::now()).await
	}

	/// Fails only when the tenant directory cannot be read. Per-tenant
	/// failures are collected in the report.
	#[instrument(skip(self, options), fields(job_type = %job_type))]
	pub async fn trigger_at(
		&self,
		job_type: &JobType,
		options: &TriggerOptions,
		now: DateTime<Utc>,
	) -> Result<TriggerReport> {
		let decision = self.decide_at(now).await?;
		let mut report = TriggerReport {
			job_type: job_type.clone(),
			decision,
			results: Vec::new(),
		};

		if !report.decision.should_execute_now {
			info!(
				next_execution_time = ?report.decision.next_execution_time,
				reason = %report.decision.reason,
				"Not executing now"
			);
			return Ok(report);
		}

		let tenants_to_run = report.decision.tenants_to_run.clone();
		for tenant_id in tenants_to_run {
			let outcome = self.run_tenant(job_type, &tenant_id, options, now).await;
			report.results.push(TenantTriggerResult { tenant_id, outcome });
		}

		info!(
			tenants = report.results.len(),
			started = report.started(),
			failed = report.failures().count(),
			catch_up = report.decision.catch_up,
			"Trigger finished"
		);
		Ok(report)
	}

	/// Record the terminal status of a run started by [`Self::trigger`].
	#[instrument(skip(self, outcome), fields(job_type = %job_type, tenant_id = %tenant_id))]
	pub async fn record_completion(
		&self,
		job_type: &JobType,
		tenant_id: &TenantId,
		run_id: &str,
		outcome: RunOutcome,
	) -> Result<SaveOutcome> {
		let update = match outcome {
			RunOutcome::Completed => {
				RunStatusUpdate::new(tenant_id.clone(), job_type.clone(), RunStatus::Completed)
			}
			RunOutcome::Failed { error } => {
				RunStatusUpdate::new(tenant_id.clone(), job_type.clone(), RunStatus::Failed).with_error(error)
			}
		}
		.with_run_id(run_id);

		Ok(self.registry.save(update).await?)
	}

	/// Tenants listed by the directory without an hours entry fall back to weekdays.
	async fn load_tenants(&self) -> Result<Vec<TenantBusinessHours>> {
		load_tenant_hours(self.directory.as_ref()).await
	}

	async fn run_tenant(
		&self,
		job_type: &JobType,
		tenant_id: &TenantId,
		options: &TriggerOptions,
		now: DateTime<Utc>,
	) -> TenantRunOutcome {
		if let Some(min_hours) = options.min_hours_between_runs {
			let eligibility = self
				.evaluator
				.should_run_at(job_type, tenant_id, min_hours, now)
				.await;
			if !eligibility.should_run {
				return TenantRunOutcome::NotEligible {
					reason: eligibility.reason,
				};
			}
		}

		let guard = self
			.detector
			.guard_at(job_type, tenant_id, options.guard_threshold_hours, now)
			.await;
		if !guard.can_proceed {
			return TenantRunOutcome::Blocked {
				reason: guard.reason,
			};
		}

		match self.engine.start_run(job_type, tenant_id, options.args.clone()).await {
			Ok(run_id) => {
				let update = RunStatusUpdate::new(tenant_id.clone(), job_type.clone(), RunStatus::Running)
					.with_run_id(run_id.clone());
				// The run is already started; a lost status write is healed by the sweep.
				if let Err(e) = self.registry.save_at(update, now).await {
					warn!(tenant_id = %tenant_id, run_id = %run_id, error = %e, "Failed to record RUNNING");
				}
				TenantRunOutcome::Started { run_id }
			}
			Err(e) => {
				warn!(tenant_id = %tenant_id, error = %e, "Workflow engine refused to start run");
				let update = RunStatusUpdate::new(tenant_id.clone(), job_type.clone(), RunStatus::Failed)
					.with_error(format!("failed to start: {e}"));
				if let Err(save_err) = self.registry.save_at(update, now).await {
					warn!(tenant_id = %tenant_id, error = %save_err, "Failed to record start failure");
				}
				TenantRunOutcome::Failed {
					error: e.to_string(),
				}
			}
		}
	}
}
