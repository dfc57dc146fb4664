// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-attempt context handed to a [`crate::maintenance::MaintenanceTask`].

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

/// What started a task run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
	Schedule,
	Manual,
	Retry,
}

impl fmt::Display for TriggerSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Schedule => write!(f, "schedule"),
			Self::Manual => write!(f, "manual"),
			Self::Retry => write!(f, "retry"),
		}
	}
}

pub struct TaskContext {
	/// Shared by every attempt of one run.
	pub run_id: String,
	pub triggered_by: TriggerSource,
	/// 1 for the first attempt.
	pub attempt: u32,
	pub started_at: DateTime<Utc>,
	pub stop: StopSignal,
}

impl TaskContext {
	pub fn new(triggered_by: TriggerSource, stop: StopSignal) -> Self {
		Self {
			run_id: uuid::Uuid::new_v4().to_string(),
			triggered_by,
			attempt: 1,
			started_at: Utc::now(),
			stop,
		}
	}

	/// Context for the next attempt of the same run.
	pub fn next_attempt(&self) -> Self {
		Self {
			run_id: self.run_id.clone(),
			triggered_by: TriggerSource::Retry,
			attempt: self.attempt + 1,
			started_at: self.started_at,
			stop: self.stop.clone(),
		}
	}

	pub fn is_stopped(&self) -> bool {
		self.stop.is_raised()
	}
}

/// One-way stop flag that task loops can also await.
#[derive(Clone)]
pub struct StopSignal {
	tx: Arc<watch::Sender<bool>>,
}

impl StopSignal {
	pub fn new() -> Self {
		let (tx, _) = watch::channel(false);
		Self { tx: Arc::new(tx) }
	}

	pub fn raise(&self) {
		self.tx.send_replace(true);
	}

	pub fn is_raised(&self) -> bool {
		*self.tx.borrow()
	}

	/// Resolves once [`StopSignal::raise`] has been called.
	pub async fn raised(&self) {
		let mut rx = self.tx.subscribe();
		// The sender lives as long as `self`, so this only returns once raised.
		let _ = rx.wait_for(|raised| *raised).await;
	}
}

impl Default for StopSignal {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;

	#[test]
	fn next_attempt_keeps_run_identity() {
		let ctx = TaskContext::new(TriggerSource::Schedule, StopSignal::new());
		let retry = ctx.next_attempt();
		assert_eq!(retry.run_id, ctx.run_id);
		assert_eq!(retry.attempt, 2);
		assert_eq!(retry.triggered_by, TriggerSource::Retry);
		assert_eq!(retry.started_at, ctx.started_at);
	}

	#[test]
	fn raised_signal_is_seen_by_clones() {
		let signal = StopSignal::new();
		let ctx = TaskContext::new(TriggerSource::Manual, signal.clone());
		assert!(!ctx.is_stopped());
		signal.raise();
		assert!(ctx.is_stopped());
		assert!(ctx.next_attempt().is_stopped());
	}

	#[tokio::test]
	async fn raised_wakes_waiters() {
		let signal = StopSignal::new();
		let waiter = {
			let signal = signal.clone();
			tokio::spawn(async move { signal.raised().await })
		};
		signal.raise();
		tokio::time::timeout(Duration::from_secs(1), waiter)
			.await
			.unwrap()
			.unwrap();

		// Already raised resolves immediately.
		tokio::time::timeout(Duration::from_millis(10), signal.raised())
			.await
			.unwrap();
	}
}
