// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;
use std::str::FromStr;

use cadence_jobs_core::StoreUnavailableBehavior;
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	DatabaseConfigLayer, HealthConfigLayer, LoggingConfigLayer, SchedulingConfigLayer,
	StatusConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file yields an empty layer.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/cadence/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: CADENCE_SERVER_<FIELD>. Lists are comma separated.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			database: Some(DatabaseConfigLayer {
				url: env_var("CADENCE_SERVER_DATABASE_URL"),
			}),
			status: Some(load_status_from_env()?),
			health: Some(load_health_from_env()?),
			scheduling: Some(load_scheduling_from_env()?),
			logging: Some(LoggingConfigLayer {
				level: env_var("CADENCE_SERVER_LOG_LEVEL"),
				json: env_bool("CADENCE_SERVER_LOG_JSON"),
			}),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u64 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_f64(name: &str) -> Result<Option<f64>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid number '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_list(name: &str) -> Option<Vec<String>> {
	env_var(name).map(|v| {
		v.split(',')
			.map(str::trim)
			.filter(|s| !s.is_empty())
			.map(String::from)
			.collect()
	})
}

fn load_status_from_env() -> Result<StatusConfigLayer, ConfigError> {
	let on_store_unavailable = match env_var("CADENCE_SERVER_ON_STORE_UNAVAILABLE") {
		Some(v) => Some(StoreUnavailableBehavior::from_str(&v).map_err(|message| {
			ConfigError::InvalidValue {
				key: "CADENCE_SERVER_ON_STORE_UNAVAILABLE".to_string(),
				message,
			}
		})?),
		None => None,
	};

	Ok(StatusConfigLayer {
		sweep_threshold_hours: env_f64("CADENCE_SERVER_SWEEP_THRESHOLD_HOURS")?,
		guard_threshold_hours: env_f64("CADENCE_SERVER_GUARD_THRESHOLD_HOURS")?,
		on_store_unavailable,
		allowed_job_types: env_list("CADENCE_SERVER_ALLOWED_JOB_TYPES"),
	})
}

fn load_health_from_env() -> Result<HealthConfigLayer, ConfigError> {
	Ok(HealthConfigLayer {
		stuck_after_hours: env_f64("CADENCE_SERVER_HEALTH_STUCK_AFTER_HOURS")?,
		overdue_after_hours: env_f64("CADENCE_SERVER_HEALTH_OVERDUE_AFTER_HOURS")?,
		monitored_job_types: env_list("CADENCE_SERVER_HEALTH_MONITORED_JOB_TYPES"),
	})
}

fn load_scheduling_from_env() -> Result<SchedulingConfigLayer, ConfigError> {
	Ok(SchedulingConfigLayer {
		catch_up_window_hours: env_f64("CADENCE_SERVER_CATCH_UP_WINDOW_HOURS")?,
		sweep_interval_secs: env_u64("CADENCE_SERVER_SWEEP_INTERVAL_SECS")?,
		health_interval_secs: env_u64("CADENCE_SERVER_HEALTH_INTERVAL_SECS")?,
		directory_path: env_var("CADENCE_SERVER_TENANT_DIRECTORY").map(PathBuf::from),
	})
}
