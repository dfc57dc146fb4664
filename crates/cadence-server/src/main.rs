// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cadence_jobs_core::{JobType, TenantId};
use cadence_server_config::{LoggingConfig, ServerConfig};
use cadence_server_scheduling::{
	BusinessHoursScheduler, FileTenantDirectory, FleetHealthAggregator, FleetHealthTask,
	load_tenant_hours, HealthThresholds, MaintenanceRunner, StaticTenantDirectory, StuckSweepTask,
	TenantDirectory,
};
use cadence_server_status::{
	RunEligibilityEvaluator, RunStatusRegistry, SqliteStatusStore, StatusStore,
	StuckExecutionDetector,
};

#[derive(Parser, Debug)]
#[command(name = "cadence-server", about = "Multi-tenant job run tracking and scheduling")]
struct Args {
	/// Config file used in place of /etc/cadence/server.toml.
	#[arg(long, env = "CADENCE_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
	/// Run the periodic stuck-run sweep and fleet health scan until interrupted.
	Serve,
	/// Reset runs stuck in RUNNING once and print the report.
	Sweep {
		/// Defaults to status.sweep_threshold_hours.
		#[arg(long)]
		hours: Option<f64>,
	},
	/// Scan every tenant and print the fleet health report.
	Health {
		/// Job types to scan. Defaults to the configured monitored set.
		#[arg(long = "job-type")]
		job_types: Vec<String>,
	},
	/// Print the business-hours decision for the current instant.
	Decide,
	/// Check whether one tenant may run a job type again.
	Eligibility {
		#[arg(long)]
		job_type: String,
		#[arg(long)]
		tenant: String,
		#[arg(long, default_value_t = 0.0)]
		min_hours: f64,
	},
	/// Run the pre-flight guard for one tenant, resetting a stuck run if found.
	Guard {
		#[arg(long)]
		job_type: String,
		#[arg(long)]
		tenant: String,
		/// Defaults to status.guard_threshold_hours.
		#[arg(long)]
		hours: Option<f64>,
	},
	/// Print version information.
	Version,
}

/// Everything the subcommands share, built once from configuration.
struct Components {
	directory: Arc<dyn TenantDirectory>,
	registry: Arc<RunStatusRegistry>,
	detector: Arc<StuckExecutionDetector>,
	aggregator: Arc<FleetHealthAggregator>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("cadence-server {}", env!("CARGO_PKG_VERSION"));
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => cadence_server_config::load_config_with_file(path),
		None => cadence_server_config::load_config(),
	}
	.context("failed to load configuration")?;

	init_tracing(&config.logging);

	tracing::info!(
		database = %config.database.url,
		on_store_unavailable = %config.status.on_store_unavailable,
		"starting cadence-server"
	);

	let components = build_components(&config).await?;

	match args.command.unwrap_or(Command::Serve) {
		Command::Serve => serve(&config, &components).await,
		Command::Sweep { hours } => {
			let hours = hours.unwrap_or(config.status.sweep_threshold_hours);
			let report = components.detector.sweep(hours).await?;
			print_json(&report)
		}
		Command::Health { job_types } => {
			let job_types = if job_types.is_empty() {
				monitored_job_types(&config, &components)
			} else {
				job_types.into_iter().map(JobType::new).collect()
			};
			let tenant_ids = components.directory.list_tenant_ids().await?;
			let report = components.aggregator.scan(&job_types, &tenant_ids).await;
			print_json(&report)
		}
		Command::Decide => {
			let tenants = load_tenant_hours(components.directory.as_ref()).await?;
			let scheduler =
				BusinessHoursScheduler::new(chrono::Duration::from_std(config.scheduling.catch_up_window()?)?);
			print_json(&scheduler.decide(chrono::Utc::now(), &tenants))
		}
		Command::Eligibility {
			job_type,
			tenant,
			min_hours,
		} => {
			let evaluator = RunEligibilityEvaluator::new(Arc::clone(&components.registry));
			let decision = evaluator
				.should_run(&JobType::new(job_type), &TenantId::new(tenant), min_hours)
				.await;
			print_json(&decision)
		}
		Command::Guard {
			job_type,
			tenant,
			hours,
		} => {
			let hours = hours.unwrap_or(config.status.guard_threshold_hours);
			let decision = components
				.detector
				.guard(&JobType::new(job_type), &TenantId::new(tenant), hours)
				.await;
			print_json(&decision)
		}
		Command::Version => Ok(()),
	}
}

fn init_tracing(logging: &LoggingConfig) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| logging.level.clone().into());

	// Logs go to stderr so command output on stdout stays machine readable.
	let (json_layer, text_layer) = if logging.json {
		(
			Some(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)),
			None,
		)
	} else {
		(
			None,
			Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
		)
	};

	tracing_subscriber::registry()
		.with(filter)
		.with(json_layer)
		.with(text_layer)
		.init();
}

async fn build_components(config: &ServerConfig) -> anyhow::Result<Components> {
	let pool = cadence_server_status::create_pool(&config.database.url).await?;
	cadence_server_status::run_migrations(&pool).await?;
	let store: Arc<dyn StatusStore> = Arc::new(SqliteStatusStore::new(pool));

	let directory: Arc<dyn TenantDirectory> = match &config.scheduling.directory_path {
		Some(path) => Arc::new(FileTenantDirectory::new(path)),
		None => {
			tracing::warn!("no tenant directory configured, no tenants will be scheduled or scanned");
			Arc::new(StaticTenantDirectory::default())
		}
	};

	let allow_list = match config.status.allow_list() {
		Some(allow_list) => allow_list,
		None => directory
			.fetch_allowed_job_types()
			.await
			.context("failed to read allowed job types from the tenant directory")?,
	};
	if allow_list.is_empty() {
		tracing::warn!("allow-list is empty, run status will not be persisted for any job type");
	}

	let registry = Arc::new(RunStatusRegistry::new(
		Arc::clone(&store),
		allow_list,
		config.status.policy(),
	));
	let detector = Arc::new(StuckExecutionDetector::new(Arc::clone(&registry)));
	let aggregator = Arc::new(FleetHealthAggregator::new(
		store,
		HealthThresholds {
			stuck_after_hours: config.health.stuck_after_hours,
			overdue_after_hours: config.health.overdue_after_hours,
		},
	));

	Ok(Components {
		directory,
		registry,
		detector,
		aggregator,
	})
}

/// Configured monitored job types, else every allow-listed job type.
fn monitored_job_types(config: &ServerConfig, components: &Components) -> Vec<JobType> {
	if !config.health.monitored_job_types.is_empty() {
		return configured_job_types(&config.health.monitored_job_types);
	}
	components
		.registry
		.allow_list()
		.iter()
		.map(JobType::from)
		.collect()
}

fn configured_job_types(names: &[String]) -> Vec<JobType> {
	names.iter().map(|name| JobType::new(name.as_str())).collect()
}

async fn serve(config: &ServerConfig, components: &Components) -> anyhow::Result<()> {
	let mut runner = MaintenanceRunner::new();
	runner.register(
		Arc::new(StuckSweepTask::new(
			Arc::clone(&components.detector),
			config.status.sweep_threshold_hours,
		)),
		Duration::from_secs(config.scheduling.sweep_interval_secs),
	);
	runner.register(
		Arc::new(FleetHealthTask::new(
			Arc::clone(&components.aggregator),
			Arc::clone(&components.directory),
			monitored_job_types(config, components),
		)),
		Duration::from_secs(config.scheduling.health_interval_secs),
	);

	runner.start().await;
	tracing::info!(
		sweep_interval_secs = config.scheduling.sweep_interval_secs,
		health_interval_secs = config.scheduling.health_interval_secs,
		"maintenance tasks scheduled"
	);

	tokio::signal::ctrl_c()
		.await
		.context("failed to listen for shutdown signal")?;
	tracing::info!("Received shutdown signal");

	runner.shutdown().await;
	for run in runner.run_history().await {
		tracing::info!(
			task_id = %run.task_id,
			run_id = %run.run_id,
			attempts = run.attempts,
			elapsed_ms = run.elapsed_ms,
			finished_at = %run.finished_at,
			outcome = ?run.outcome,
			"Last maintenance run"
		);
	}
	tracing::info!("Server shutdown complete");
	Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_no_subcommand_defaults_to_serve() {
		let args = Args::try_parse_from(["cadence-server"]).unwrap();
		assert!(args.command.is_none());
		assert!(args.config.is_none());
	}

	#[test]
	fn test_sweep_hours_override() {
		let args = Args::try_parse_from(["cadence-server", "sweep", "--hours", "12"]).unwrap();
		assert_eq!(args.command, Some(Command::Sweep { hours: Some(12.0) }));
	}

	#[test]
	fn test_health_accepts_repeated_job_types() {
		let args = Args::try_parse_from([
			"cadence-server",
			"health",
			"--job-type",
			"email-sync",
			"--job-type",
			"lead-scoring",
		])
		.unwrap();
		assert_eq!(
			args.command,
			Some(Command::Health {
				job_types: vec!["email-sync".to_string(), "lead-scoring".to_string()],
			})
		);
	}

	#[test]
	fn test_guard_requires_tenant() {
		assert!(Args::try_parse_from(["cadence-server", "guard", "--job-type", "email-sync"]).is_err());
	}

	#[test]
	fn test_eligibility_defaults_min_hours() {
		let args = Args::try_parse_from([
			"cadence-server",
			"--config",
			"/tmp/cadence.toml",
			"eligibility",
			"--job-type",
			"email-sync",
			"--tenant",
			"site-1",
		])
		.unwrap();
		assert_eq!(args.config, Some(PathBuf::from("/tmp/cadence.toml")));
		assert_eq!(
			args.command,
			Some(Command::Eligibility {
				job_type: "email-sync".to_string(),
				tenant: "site-1".to_string(),
				min_hours: 0.0,
			})
		);
	}

	#[test]
	fn test_configured_job_types() {
		let job_types = configured_job_types(&["email-sync".to_string()]);
		assert_eq!(job_types, vec![JobType::new("email-sync")]);
	}
}
