// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the core job model.

use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, JobsCoreError>;

/// Errors that can occur while building or validating core types.
#[derive(Debug, Error)]
pub enum JobsCoreError {
	#[error("invalid status update: {0}")]
	Validation(String),

	#[error("invalid run status: {0}")]
	InvalidStatus(String),

	#[error("invalid business hours: {0}")]
	InvalidBusinessHours(String),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}
