// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections, each with a partial layer and a resolved form.

mod database;
mod health;
mod logging;
mod scheduling;
mod status;

pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use health::{HealthConfig, HealthConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use scheduling::{SchedulingConfig, SchedulingConfigLayer};
pub use status::{StatusConfig, StatusConfigLayer};

use crate::error::ConfigError;

/// Upper bound for every hour-valued setting: one year.
pub const MAX_HOURS: f64 = 24.0 * 365.0;

pub(crate) fn require_positive_hours(key: &str, value: f64) -> Result<f64, ConfigError> {
	if value.is_finite() && value > 0.0 && value <= MAX_HOURS {
		Ok(value)
	} else {
		Err(ConfigError::Validation(format!(
			"{key} must be a positive number of hours up to {MAX_HOURS}, got {value}"
		)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_hours_are_bounded() {
		assert_eq!(require_positive_hours("h", 6.0).unwrap(), 6.0);
		assert_eq!(require_positive_hours("h", MAX_HOURS).unwrap(), MAX_HOURS);
		for value in [0.0, -1.0, f64::NAN, f64::INFINITY, MAX_HOURS + 1.0, 1e300] {
			assert!(
				matches!(require_positive_hours("h", value), Err(ConfigError::Validation(_))),
				"{value} should be rejected"
			);
		}
	}
}
