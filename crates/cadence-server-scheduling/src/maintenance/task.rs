// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::maintenance::context::TaskContext;

#[derive(Debug, Error)]
pub enum TaskError {
	#[error("task failed: {message}")]
	Failed { message: String, retryable: bool },

	#[error("task cancelled")]
	Cancelled,

	#[error("task not found: {0}")]
	NotFound(String),
}

impl TaskError {
	pub fn retryable(message: impl Into<String>) -> Self {
		Self::Failed {
			message: message.into(),
			retryable: true,
		}
	}

	pub fn fatal(message: impl Into<String>) -> Self {
		Self::Failed {
			message: message.into(),
			retryable: false,
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskOutput {
	pub message: String,
	pub metadata: Option<serde_json::Value>,
}

/// A unit of periodic maintenance run by [`crate::maintenance::MaintenanceRunner`].
#[async_trait]
pub trait MaintenanceTask: Send + Sync {
	fn id(&self) -> &str;
	fn name(&self) -> &str;
	fn description(&self) -> &str;
	async fn run(&self, ctx: &TaskContext) -> Result<TaskOutput, TaskError>;
}
