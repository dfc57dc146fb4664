// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for scheduling operations.

use std::path::PathBuf;

use cadence_server_status::StatusError;
use thiserror::Error;

/// Result type for scheduling operations.
pub type Result<T> = std::result::Result<T, SchedulingError>;

#[derive(Debug, Error)]
pub enum SchedulingError {
	#[error("invalid cron expression: {0}")]
	InvalidCronExpression(String),

	#[error("invalid timezone: {0}")]
	InvalidTimezone(String),

	#[error("failed to read tenant directory {path}: {source}")]
	DirectoryRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse tenant directory {path}: {source}")]
	DirectoryParse {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error("workflow engine error: {0}")]
	Engine(String),

	#[error("status error: {0}")]
	Status(#[from] StatusError),

	#[error("internal error: {0}")]
	Internal(String),
}
