// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::require_positive_hours;
use crate::error::ConfigError;

pub const DEFAULT_CATCH_UP_WINDOW_HOURS: f64 = 6.0;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_HEALTH_INTERVAL_SECS: u64 = 900;
/// Longest maintenance interval accepted: one year.
pub const MAX_INTERVAL_SECS: u64 = 365 * 24 * 3600;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SchedulingConfigLayer {
	#[serde(default)]
	pub catch_up_window_hours: Option<f64>,
	#[serde(default)]
	pub sweep_interval_secs: Option<u64>,
	#[serde(default)]
	pub health_interval_secs: Option<u64>,
	#[serde(default)]
	pub directory_path: Option<PathBuf>,
}

impl SchedulingConfigLayer {
	pub fn merge(&mut self, other: SchedulingConfigLayer) {
		if other.catch_up_window_hours.is_some() {
			self.catch_up_window_hours = other.catch_up_window_hours;
		}
		if other.sweep_interval_secs.is_some() {
			self.sweep_interval_secs = other.sweep_interval_secs;
		}
		if other.health_interval_secs.is_some() {
			self.health_interval_secs = other.health_interval_secs;
		}
		if other.directory_path.is_some() {
			self.directory_path = other.directory_path;
		}
	}

	pub fn finalize(self) -> Result<SchedulingConfig, ConfigError> {
		let sweep_interval_secs = self.sweep_interval_secs.unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);
		let health_interval_secs = self.health_interval_secs.unwrap_or(DEFAULT_HEALTH_INTERVAL_SECS);
		for (key, secs) in [
			("scheduling.sweep_interval_secs", sweep_interval_secs),
			("scheduling.health_interval_secs", health_interval_secs),
		] {
			if secs == 0 || secs > MAX_INTERVAL_SECS {
				return Err(ConfigError::Validation(format!(
					"{key} must be between 1 and {MAX_INTERVAL_SECS} seconds, got {secs}"
				)));
			}
		}

		Ok(SchedulingConfig {
			catch_up_window_hours: require_positive_hours(
				"scheduling.catch_up_window_hours",
				self.catch_up_window_hours.unwrap_or(DEFAULT_CATCH_UP_WINDOW_HOURS),
			)?,
			sweep_interval_secs,
			health_interval_secs,
			directory_path: self.directory_path,
		})
	}
}

/// Business-hours scheduling and maintenance cadence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulingConfig {
	pub catch_up_window_hours: f64,
	pub sweep_interval_secs: u64,
	pub health_interval_secs: u64,
	/// JSON tenant directory. Without one the server knows no tenants.
	pub directory_path: Option<PathBuf>,
}

impl SchedulingConfig {
	/// Fails for a window that was set without going through `finalize`
	/// and does not fit a [`std::time::Duration`].
	pub fn catch_up_window(&self) -> Result<std::time::Duration, ConfigError> {
		std::time::Duration::try_from_secs_f64(self.catch_up_window_hours * 3600.0).map_err(|e| {
			ConfigError::Validation(format!(
				"scheduling.catch_up_window_hours {} is not a usable duration: {e}",
				self.catch_up_window_hours
			))
		})
	}
}

impl Default for SchedulingConfig {
	fn default() -> Self {
		Self {
			catch_up_window_hours: DEFAULT_CATCH_UP_WINDOW_HOURS,
			sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
			health_interval_secs: DEFAULT_HEALTH_INTERVAL_SECS,
			directory_path: None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = SchedulingConfigLayer::default().finalize().unwrap();
		assert_eq!(config, SchedulingConfig::default());
		assert_eq!(config.catch_up_window().unwrap().as_secs(), 6 * 3600);
	}

	#[test]
	fn test_huge_catch_up_window_is_rejected() {
		let layer = SchedulingConfigLayer {
			catch_up_window_hours: Some(1e300),
			..Default::default()
		};
		assert!(matches!(layer.finalize(), Err(ConfigError::Validation(_))));

		let config = SchedulingConfig {
			catch_up_window_hours: 1e300,
			..Default::default()
		};
		assert!(matches!(config.catch_up_window(), Err(ConfigError::Validation(_))));
		let config = SchedulingConfig {
			catch_up_window_hours: -1.0,
			..Default::default()
		};
		assert!(config.catch_up_window().is_err());
	}

	#[test]
	fn test_huge_interval_is_rejected() {
		let layer = SchedulingConfigLayer {
			sweep_interval_secs: Some(u64::MAX),
			..Default::default()
		};
		assert!(matches!(layer.finalize(), Err(ConfigError::Validation(_))));
	}

	#[test]
	fn test_zero_interval_is_rejected() {
		let layer = SchedulingConfigLayer {
			health_interval_secs: Some(0),
			..Default::default()
		};
		assert!(matches!(layer.finalize(), Err(ConfigError::Validation(_))));
	}

	#[test]
	fn test_directory_path_from_toml() {
		let layer: SchedulingConfigLayer =
			toml::from_str(r#"directory_path = "/etc/cadence/tenants.json""#).unwrap();
		let config = layer.finalize().unwrap();
		assert_eq!(
			config.directory_path,
			Some(PathBuf::from("/etc/cadence/tenants.json"))
		);
	}
}
