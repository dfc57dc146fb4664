// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, instrument, warn};

use crate::maintenance::context::{StopSignal, TaskContext, TriggerSource};
use crate::maintenance::task::{MaintenanceTask, TaskError, TaskOutput};

const BASE_RETRY_DELAY_SECS: u64 = 1;
const MAX_RETRY_DELAY_SECS: u64 = 60;
const RETRY_FACTOR: f64 = 2.0;
const MAX_RETRIES: u32 = 3;

/// How the last run of a task ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunOutcome {
	Succeeded { message: String },
	Failed { message: String },
	Stopped,
}

/// The last run of one task, across all of its attempts.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRunSummary {
	pub task_id: String,
	pub task_name: String,
	pub run_id: String,
	pub triggered_by: TriggerSource,
	pub attempts: u32,
	pub elapsed_ms: u64,
	pub finished_at: DateTime<Utc>,
	pub outcome: RunOutcome,
}

type RunHistory = Arc<RwLock<HashMap<String, TaskRunSummary>>>;

struct RegisteredTask {
	task: Arc<dyn MaintenanceTask>,
	interval: Duration,
	stop: StopSignal,
}

/// Runs registered maintenance tasks on fixed intervals until shut down.
///
/// Each task gets its own loop and stop signal. The runner keeps the last
/// run of every task so the binary can report it on shutdown.
pub struct MaintenanceRunner {
	tasks: HashMap<String, RegisteredTask>,
	history: RunHistory,
	handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for MaintenanceRunner {
	fn default() -> Self {
		Self::new()
	}
}

impl MaintenanceRunner {
	pub fn new() -> Self {
		Self {
			tasks: HashMap::new(),
			history: Arc::new(RwLock::new(HashMap::new())),
			handles: Mutex::new(Vec::new()),
		}
	}

	pub fn register(&mut self, task: Arc<dyn MaintenanceTask>, interval: Duration) {
		let id = task.id().to_string();
		self.tasks.insert(
			id,
			RegisteredTask {
				task,
				interval,
				stop: StopSignal::new(),
			},
		);
	}

	/// Spawn one loop per task. The first run happens one interval after start;
	/// ticks missed while a slow run is in flight are skipped.
	#[instrument(skip(self))]
	pub async fn start(&self) {
		let mut handles = self.handles.lock().await;

		for (task_id, registered) in &self.tasks {
			let task = Arc::clone(&registered.task);
			let interval = registered.interval;
			let stop = registered.stop.clone();
			let history = Arc::clone(&self.history);
			let task_id = task_id.clone();

			let handle = tokio::spawn(async move {
				let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
				ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
				loop {
					tokio::select! {
						_ = ticker.tick() => {
							let ctx = TaskContext::new(TriggerSource::Schedule, stop.clone());
							let _ = run_and_record(&task, ctx, &history).await;
						}
						_ = stop.raised() => {
							info!(task_id = %task_id, "Maintenance task loop stopped");
							break;
						}
					}
				}
			});

			handles.push(handle);
		}

		info!(task_count = handles.len(), "Maintenance runner started");
	}

	#[instrument(skip(self))]
	pub async fn trigger(&self, task_id: &str, triggered_by: TriggerSource) -> Result<TaskOutput, TaskError> {
		let registered = self
			.tasks
			.get(task_id)
			.ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;

		let ctx = TaskContext::new(triggered_by, registered.stop.clone());
		run_and_record(&registered.task, ctx, &self.history).await
	}

	/// Stop one task's loop. Later manual triggers report it as stopped.
	pub fn cancel(&self, task_id: &str) -> Result<(), TaskError> {
		let registered = self
			.tasks
			.get(task_id)
			.ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;

		registered.stop.raise();
		Ok(())
	}

	#[instrument(skip(self))]
	pub async fn shutdown(&self) {
		for registered in self.tasks.values() {
			registered.stop.raise();
		}

		let mut handles = self.handles.lock().await;
		for handle in handles.drain(..) {
			let _ = handle.await;
		}

		info!("Maintenance runner shut down");
	}

	pub fn task_ids(&self) -> Vec<String> {
		self.tasks.keys().cloned().collect()
	}

	pub async fn last_run(&self, task_id: &str) -> Option<TaskRunSummary> {
		self.history.read().await.get(task_id).cloned()
	}

	/// Last run of every task that has run at least once, ordered by task id.
	pub async fn run_history(&self) -> Vec<TaskRunSummary> {
		let mut runs: Vec<_> = self.history.read().await.values().cloned().collect();
		runs.sort_by(|a, b| a.task_id.cmp(&b.task_id));
		runs
	}
}

async fn run_and_record(
	task: &Arc<dyn MaintenanceTask>,
	ctx: TaskContext,
	history: &RunHistory,
) -> Result<TaskOutput, TaskError> {
	let (result, summary) = run_task_with_retry(task, ctx).await;
	history.write().await.insert(summary.task_id.clone(), summary);
	result
}

async fn run_task_with_retry(
	task: &Arc<dyn MaintenanceTask>,
	mut ctx: TaskContext,
) -> (Result<TaskOutput, TaskError>, TaskRunSummary) {
	let started = Instant::now();
	let triggered_by = ctx.triggered_by;

	let result = loop {
		match task.run(&ctx).await {
			Ok(output) => break Ok(output),
			Err(TaskError::Failed { message, retryable }) if retryable && ctx.attempt <= MAX_RETRIES => {
				let delay_secs = calculate_backoff_delay(ctx.attempt);
				warn!(
					task_id = %task.id(),
					run_id = %ctx.run_id,
					attempt = ctx.attempt,
					delay_secs,
					error = %message,
					"Maintenance task failed, retrying"
				);
				tokio::time::sleep(Duration::from_secs(delay_secs)).await;
				ctx = ctx.next_attempt();
			}
			Err(e) => break Err(e),
		}
	};

	let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
	let outcome = match &result {
		Ok(output) => {
			info!(
				task_id = %task.id(),
				task_name = %task.name(),
				run_id = %ctx.run_id,
				triggered_by = %triggered_by,
				attempts = ctx.attempt,
				elapsed_ms,
				summary = %metadata_summary(output.metadata.as_ref()),
				message = %output.message,
				"Maintenance task completed"
			);
			RunOutcome::Succeeded {
				message: output.message.clone(),
			}
		}
		Err(TaskError::Cancelled) => {
			info!(task_id = %task.id(), run_id = %ctx.run_id, "Maintenance task stopped");
			RunOutcome::Stopped
		}
		Err(e) => {
			warn!(
				task_id = %task.id(),
				task_name = %task.name(),
				run_id = %ctx.run_id,
				attempts = ctx.attempt,
				elapsed_ms,
				error = %e,
				"Maintenance task failed"
			);
			RunOutcome::Failed { message: e.to_string() }
		}
	};

	let summary = TaskRunSummary {
		task_id: task.id().to_string(),
		task_name: task.name().to_string(),
		run_id: ctx.run_id.clone(),
		triggered_by,
		attempts: ctx.attempt,
		elapsed_ms,
		finished_at: Utc::now(),
		outcome,
	};
	(result, summary)
}

/// Top-level scalar fields of a task report as `key=value` pairs.
pub(crate) fn metadata_summary(metadata: Option<&serde_json::Value>) -> String {
	let Some(serde_json::Value::Object(fields)) = metadata else {
		return String::new();
	};
	fields
		.iter()
		.filter(|(_, value)| !value.is_object() && !value.is_array() && !value.is_null())
		.map(|(key, value)| format!("{key}={value}"))
		.collect::<Vec<_>>()
		.join(" ")
}

pub(crate) fn calculate_backoff_delay(retry_count: u32) -> u64 {
	let delay = BASE_RETRY_DELAY_SECS as f64 * RETRY_FACTOR.powi(retry_count as i32 - 1);
	(delay as u64).min(MAX_RETRY_DELAY_SECS)
}
