// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;

use cadence_jobs_core::JobType;

use crate::directory::TenantDirectory;
use crate::health::{FleetHealthAggregator, FleetHealthReport};
use crate::maintenance::context::TaskContext;
use crate::maintenance::task::{MaintenanceTask, TaskError, TaskOutput};

/// Periodic fleet health scan over every tenant in the directory.
pub struct FleetHealthTask {
	aggregator: Arc<FleetHealthAggregator>,
	directory: Arc<dyn TenantDirectory>,
	/// Empty means every job type the directory allows.
	monitored_job_types: Vec<JobType>,
	latest: RwLock<Option<FleetHealthReport>>,
}

impl FleetHealthTask {
	pub fn new(
		aggregator: Arc<FleetHealthAggregator>,
		directory: Arc<dyn TenantDirectory>,
		monitored_job_types: Vec<JobType>,
	) -> Self {
		Self {
			aggregator,
			directory,
			monitored_job_types,
			latest: RwLock::new(None),
		}
	}

	pub async fn latest_report(&self) -> Option<FleetHealthReport> {
		self.latest.read().await.clone()
	}

	async fn job_types(&self) -> Result<Vec<JobType>, TaskError> {
		if !self.monitored_job_types.is_empty() {
			return Ok(self.monitored_job_types.clone());
		}
		let allowed = self
			.directory
			.fetch_allowed_job_types()
			.await
			.map_err(|e| TaskError::retryable(e.to_string()))?;
		Ok(allowed.iter().map(JobType::from).collect())
	}
}

#[async_trait]
impl MaintenanceTask for FleetHealthTask {
	fn id(&self) -> &str {
		"fleet-health"
	}

	fn name(&self) -> &str {
		"Fleet health scan"
	}

	fn description(&self) -> &str {
		"Classifies every tenant's job status and flags fleets that need attention"
	}

	async fn run(&self, ctx: &TaskContext) -> Result<TaskOutput, TaskError> {
		if ctx.is_stopped() {
			return Err(TaskError::Cancelled);
		}

		let tenant_ids = self
			.directory
			.list_tenant_ids()
			.await
			.map_err(|e| TaskError::retryable(e.to_string()))?;
		let job_types = self.job_types().await?;

		let report = self.aggregator.scan(&job_types, &tenant_ids).await;
		if report.needs_attention {
			for issue in report.issues.iter().filter(|i| i.severity == crate::health::Severity::Critical) {
				warn!(
					run_id = %ctx.run_id,
					kind = ?issue.kind,
					tenant_id = ?issue.tenant_id,
					job_type = ?issue.job_type,
					message = %issue.message,
					"Critical fleet health issue"
				);
			}
		}

		let output = TaskOutput {
			message: format!(
				"{} workflow(s) checked, {} issue(s), needs attention: {}",
				report.total_workflows,
				report.issues.len(),
				report.needs_attention
			),
			metadata: serde_json::to_value(&report).ok(),
		};
		*self.latest.write().await = Some(report);
		Ok(output)
	}
}
