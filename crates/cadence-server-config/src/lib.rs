// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for the Cadence server.
//!
//! Sources, lowest to highest precedence:
//! 1. Built-in defaults
//! 2. Config file (`/etc/cadence/server.toml`)
//! 3. Environment variables (`CADENCE_SERVER_*`)
//!
//! ```ignore
//! use cadence_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("sweeping runs stuck for {}h", config.status.sweep_threshold_hours);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub database: DatabaseConfig,
	pub status: StatusConfig,
	pub health: HealthConfig,
	pub scheduling: SchedulingConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only.
pub fn load_config_from_env() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![Box::new(EnvSource)])
}

/// Load configuration with a custom config file path in place of the system one.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Resolve a merged layer, applying defaults and validating thresholds.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let database = layer.database.unwrap_or_default().finalize();
	let status = layer.status.unwrap_or_default().finalize()?;
	let health = layer.health.unwrap_or_default().finalize()?;
	let scheduling = layer.scheduling.unwrap_or_default().finalize()?;
	let logging = layer.logging.unwrap_or_default().finalize();

	info!(
		database = %database.url,
		sweep_threshold_hours = status.sweep_threshold_hours,
		guard_threshold_hours = status.guard_threshold_hours,
		on_store_unavailable = %status.on_store_unavailable,
		allowed_job_types = status.allowed_job_types.len(),
		catch_up_window_hours = scheduling.catch_up_window_hours,
		directory_configured = scheduling.directory_path.is_some(),
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		database,
		status,
		health,
		scheduling,
		logging,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use cadence_jobs_core::StoreUnavailableBehavior;
	use proptest::prelude::*;
	use std::io::Write;
	use tempfile::NamedTempFile;

	#[test]
	fn test_finalize_empty_layer_uses_defaults() {
		let config = finalize(ServerConfigLayer::default()).unwrap();
		assert_eq!(config.database, DatabaseConfig::default());
		assert_eq!(config.status, StatusConfig::default());
		assert_eq!(config.health, HealthConfig::default());
		assert_eq!(config.scheduling, SchedulingConfig::default());
		assert_eq!(config.logging, LoggingConfig::default());
	}

	#[test]
	fn test_load_config_with_file() {
		let mut file = NamedTempFile::new().unwrap();
		write!(
			file,
			r#"
[database]
url = "sqlite:/var/lib/cadence/status.db"

[status]
sweep_threshold_hours = 12.0
on_store_unavailable = "fail_closed"
allowed_job_types = ["email-sync"]

[scheduling]
catch_up_window_hours = 4.0

[logging]
level = "debug"
"#
		)
		.unwrap();

		let config = load_config_with_file(file.path()).unwrap();
		assert_eq!(config.database.url, "sqlite:/var/lib/cadence/status.db");
		assert_eq!(config.status.sweep_threshold_hours, 12.0);
		assert_eq!(config.status.guard_threshold_hours, 6.0);
		assert_eq!(
			config.status.on_store_unavailable,
			StoreUnavailableBehavior::FailClosed
		);
		assert_eq!(config.scheduling.catch_up_window_hours, 4.0);
		assert_eq!(config.logging.level, "debug");
		assert!(!config.logging.json);
	}

	#[test]
	fn test_invalid_file_value_fails_validation() {
		let mut file = NamedTempFile::new().unwrap();
		write!(file, "[health]\noverdue_after_hours = 0.0\n").unwrap();
		assert!(matches!(
			load_config_with_file(file.path()),
			Err(ConfigError::Validation(_))
		));
	}

	#[test]
	fn test_unknown_store_behavior_is_a_parse_error() {
		let mut file = NamedTempFile::new().unwrap();
		write!(file, "[status]\non_store_unavailable = \"maybe\"\n").unwrap();
		assert!(matches!(
			load_config_with_file(file.path()),
			Err(ConfigError::TomlParse { .. })
		));
	}

	proptest! {
		#[test]
		fn later_layer_wins_for_thresholds(a in 0.1f64..100.0, b in 0.1f64..100.0) {
			let mut merged = ServerConfigLayer::default();
			merged.merge(ServerConfigLayer {
				status: Some(StatusConfigLayer { sweep_threshold_hours: Some(a), ..Default::default() }),
				..Default::default()
			});
			merged.merge(ServerConfigLayer {
				status: Some(StatusConfigLayer { sweep_threshold_hours: Some(b), ..Default::default() }),
				..Default::default()
			});
			let config = finalize(merged).unwrap();
			prop_assert_eq!(config.status.sweep_threshold_hours, b);
		}
	}
}
