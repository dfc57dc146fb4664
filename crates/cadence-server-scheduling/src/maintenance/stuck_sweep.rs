// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use cadence_server_status::{StatusError, StuckExecutionDetector};

use crate::maintenance::context::TaskContext;
use crate::maintenance::task::{MaintenanceTask, TaskError, TaskOutput};

/// Resets runs stuck in `RUNNING` across every tenant.
pub struct StuckSweepTask {
	detector: Arc<StuckExecutionDetector>,
	hours_threshold: f64,
}

impl StuckSweepTask {
	pub fn new(detector: Arc<StuckExecutionDetector>, hours_threshold: f64) -> Self {
		Self {
			detector,
			hours_threshold,
		}
	}
}

#[async_trait]
impl MaintenanceTask for StuckSweepTask {
	fn id(&self) -> &str {
		"stuck-run-sweep"
	}

	fn name(&self) -> &str {
		"Stuck run sweep"
	}

	fn description(&self) -> &str {
		"Resets runs left in RUNNING past the stuck threshold to FAILED"
	}

	async fn run(&self, ctx: &TaskContext) -> Result<TaskOutput, TaskError> {
		if ctx.is_stopped() {
			return Err(TaskError::Cancelled);
		}

		let report = self.detector.sweep(self.hours_threshold).await.map_err(|e| match e {
			StatusError::Validation(message) => TaskError::fatal(message),
			other => TaskError::retryable(other.to_string()),
		})?;

		if !report.errors.is_empty() {
			warn!(
				run_id = %ctx.run_id,
				failed = report.errors.len(),
				"Some stuck runs could not be reset"
			);
		}

		Ok(TaskOutput {
			message: format!(
				"Reset {} stuck run(s), {} failure(s)",
				report.cleaned,
				report.errors.len()
			),
			metadata: serde_json::to_value(&report).ok(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::maintenance::context::{StopSignal, TriggerSource};
	use crate::testing::{create_test_store, registry, seed};
	use cadence_jobs_core::{JobType, RunStatus, TenantId};
	use chrono::{Duration, Utc};

	fn ctx() -> TaskContext {
		TaskContext::new(TriggerSource::Manual, StopSignal::new())
	}

	#[tokio::test]
	async fn test_sweep_task_resets_stuck_runs() {
		let (_pool, store) = create_test_store().await;
		seed(&store, "site-1", "email-sync", RunStatus::Running, Utc::now() - Duration::hours(30)).await;
		seed(&store, "site-2", "email-sync", RunStatus::Running, Utc::now() - Duration::minutes(5)).await;
		let registry = registry(store);
		let task = StuckSweepTask::new(Arc::new(StuckExecutionDetector::new(registry.clone())), 6.0);

		let output = task.run(&ctx()).await.unwrap();
		assert_eq!(output.message, "Reset 1 stuck run(s), 0 failure(s)");
		assert_eq!(output.metadata.unwrap()["cleaned"], 1);

		let records = registry
			.get(&JobType::new("email-sync"), &[TenantId::new("site-1"), TenantId::new("site-2")])
			.await
			.unwrap();
		let statuses: Vec<_> = records.iter().map(|r| (r.tenant_id.as_str().to_string(), r.status)).collect();
		assert!(statuses.contains(&("site-1".to_string(), RunStatus::Failed)));
		assert!(statuses.contains(&("site-2".to_string(), RunStatus::Running)));
	}

	#[tokio::test]
	async fn test_store_outage_is_retryable() {
		let (pool, store) = create_test_store().await;
		let task = StuckSweepTask::new(Arc::new(StuckExecutionDetector::new(registry(store))), 6.0);
		pool.close().await;

		assert!(matches!(
			task.run(&ctx()).await,
			Err(TaskError::Failed { retryable: true, .. })
		));
	}

	#[tokio::test]
	async fn test_invalid_threshold_is_fatal() {
		let (_pool, store) = create_test_store().await;
		let task = StuckSweepTask::new(Arc::new(StuckExecutionDetector::new(registry(store))), -1.0);

		assert!(matches!(
			task.run(&ctx()).await,
			Err(TaskError::Failed { retryable: false, .. })
		));
	}
}
