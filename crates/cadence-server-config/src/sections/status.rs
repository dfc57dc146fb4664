// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Run-status tracking: allow-list, stuck thresholds and outage behavior.

use serde::{Deserialize, Serialize};

use cadence_jobs_core::{JobTypeAllowList, StoreFailurePolicy, StoreUnavailableBehavior};

use super::require_positive_hours;
use crate::error::ConfigError;

pub const DEFAULT_SWEEP_THRESHOLD_HOURS: f64 = 6.0;
pub const DEFAULT_GUARD_THRESHOLD_HOURS: f64 = 6.0;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StatusConfigLayer {
	#[serde(default)]
	pub sweep_threshold_hours: Option<f64>,
	#[serde(default)]
	pub guard_threshold_hours: Option<f64>,
	#[serde(default)]
	pub on_store_unavailable: Option<StoreUnavailableBehavior>,
	/// Job types allowed to persist status. Empty defers to the tenant directory.
	#[serde(default)]
	pub allowed_job_types: Option<Vec<String>>,
}

impl StatusConfigLayer {
	pub fn merge(&mut self, other: StatusConfigLayer) {
		if other.sweep_threshold_hours.is_some() {
			self.sweep_threshold_hours = other.sweep_threshold_hours;
		}
		if other.guard_threshold_hours.is_some() {
			self.guard_threshold_hours = other.guard_threshold_hours;
		}
		if other.on_store_unavailable.is_some() {
			self.on_store_unavailable = other.on_store_unavailable;
		}
		if other.allowed_job_types.is_some() {
			self.allowed_job_types = other.allowed_job_types;
		}
	}

	pub fn finalize(self) -> Result<StatusConfig, ConfigError> {
		Ok(StatusConfig {
			sweep_threshold_hours: require_positive_hours(
				"status.sweep_threshold_hours",
				self.sweep_threshold_hours.unwrap_or(DEFAULT_SWEEP_THRESHOLD_HOURS),
			)?,
			guard_threshold_hours: require_positive_hours(
				"status.guard_threshold_hours",
				self.guard_threshold_hours.unwrap_or(DEFAULT_GUARD_THRESHOLD_HOURS),
			)?,
			on_store_unavailable: self.on_store_unavailable.unwrap_or_default(),
			allowed_job_types: self.allowed_job_types.unwrap_or_default(),
		})
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusConfig {
	pub sweep_threshold_hours: f64,
	pub guard_threshold_hours: f64,
	pub on_store_unavailable: StoreUnavailableBehavior,
	pub allowed_job_types: Vec<String>,
}

impl StatusConfig {
	pub fn policy(&self) -> StoreFailurePolicy {
		StoreFailurePolicy {
			on_store_unavailable: self.on_store_unavailable,
		}
	}

	/// The configured allow-list, or `None` when the directory should supply it.
	pub fn allow_list(&self) -> Option<JobTypeAllowList> {
		if self.allowed_job_types.is_empty() {
			None
		} else {
			Some(JobTypeAllowList::new(self.allowed_job_types.iter().cloned()))
		}
	}
}

impl Default for StatusConfig {
	fn default() -> Self {
		Self {
			sweep_threshold_hours: DEFAULT_SWEEP_THRESHOLD_HOURS,
			guard_threshold_hours: DEFAULT_GUARD_THRESHOLD_HOURS,
			on_store_unavailable: StoreUnavailableBehavior::FailOpen,
			allowed_job_types: Vec::new(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = StatusConfigLayer::default().finalize().unwrap();
		assert_eq!(config, StatusConfig::default());
		assert!(config.policy().is_fail_open());
		assert!(config.allow_list().is_none());
	}

	#[test]
	fn test_fail_closed_from_toml() {
		let layer: StatusConfigLayer = toml::from_str(
			r#"
on_store_unavailable = "fail_closed"
allowed_job_types = ["email-sync", "lead-scoring"]
"#,
		)
		.unwrap();
		let config = layer.finalize().unwrap();
		assert!(!config.policy().is_fail_open());
		let allow_list = config.allow_list().unwrap();
		assert!(allow_list.allows("lead-scoring"));
		assert!(!allow_list.allows("content-generation"));
	}

	#[test]
	fn test_rejects_non_positive_thresholds() {
		let layer = StatusConfigLayer {
			sweep_threshold_hours: Some(0.0),
			..Default::default()
		};
		assert!(matches!(layer.finalize(), Err(ConfigError::Validation(_))));

		let layer = StatusConfigLayer {
			guard_threshold_hours: Some(f64::NAN),
			..Default::default()
		};
		assert!(matches!(layer.finalize(), Err(ConfigError::Validation(_))));
	}
}
