// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

use super::require_positive_hours;
use crate::error::ConfigError;

pub const DEFAULT_STUCK_AFTER_HOURS: f64 = 2.0;
pub const DEFAULT_OVERDUE_AFTER_HOURS: f64 = 24.0;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HealthConfigLayer {
	#[serde(default)]
	pub stuck_after_hours: Option<f64>,
	#[serde(default)]
	pub overdue_after_hours: Option<f64>,
	#[serde(default)]
	pub monitored_job_types: Option<Vec<String>>,
}

impl HealthConfigLayer {
	pub fn merge(&mut self, other: HealthConfigLayer) {
		if other.stuck_after_hours.is_some() {
			self.stuck_after_hours = other.stuck_after_hours;
		}
		if other.overdue_after_hours.is_some() {
			self.overdue_after_hours = other.overdue_after_hours;
		}
		if other.monitored_job_types.is_some() {
			self.monitored_job_types = other.monitored_job_types;
		}
	}

	pub fn finalize(self) -> Result<HealthConfig, ConfigError> {
		Ok(HealthConfig {
			stuck_after_hours: require_positive_hours(
				"health.stuck_after_hours",
				self.stuck_after_hours.unwrap_or(DEFAULT_STUCK_AFTER_HOURS),
			)?,
			overdue_after_hours: require_positive_hours(
				"health.overdue_after_hours",
				self.overdue_after_hours.unwrap_or(DEFAULT_OVERDUE_AFTER_HOURS),
			)?,
			monitored_job_types: self.monitored_job_types.unwrap_or_default(),
		})
	}
}

/// Fleet health classification thresholds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthConfig {
	pub stuck_after_hours: f64,
	pub overdue_after_hours: f64,
	/// Job types to scan. Empty scans every allow-listed job type.
	pub monitored_job_types: Vec<String>,
}

impl Default for HealthConfig {
	fn default() -> Self {
		Self {
			stuck_after_hours: DEFAULT_STUCK_AFTER_HOURS,
			overdue_after_hours: DEFAULT_OVERDUE_AFTER_HOURS,
			monitored_job_types: Vec::new(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_partial_layer_keeps_defaults() {
		let layer: HealthConfigLayer = toml::from_str("overdue_after_hours = 48.0").unwrap();
		let config = layer.finalize().unwrap();
		assert_eq!(config.stuck_after_hours, DEFAULT_STUCK_AFTER_HOURS);
		assert_eq!(config.overdue_after_hours, 48.0);
	}

	#[test]
	fn test_negative_threshold_is_rejected() {
		let layer = HealthConfigLayer {
			stuck_after_hours: Some(-1.0),
			..Default::default()
		};
		assert!(layer.finalize().is_err());
	}
}
