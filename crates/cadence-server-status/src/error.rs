// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for status operations.

use cadence_jobs_core::JobsCoreError;
use thiserror::Error;

/// Result type for status operations.
pub type Result<T> = std::result::Result<T, StatusError>;

/// Errors that can occur in status operations.
#[derive(Debug, Error)]
pub enum StatusError {
	#[error("status store unavailable: {0}")]
	StoreUnavailable(String),

	#[error("validation error: {0}")]
	Validation(String),

	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),

	#[error("internal error: {0}")]
	Internal(String),
}

impl From<JobsCoreError> for StatusError {
	fn from(e: JobsCoreError) -> Self {
		match e {
			JobsCoreError::Validation(msg) => Self::Validation(msg),
			other => Self::Internal(other.to_string()),
		}
	}
}
