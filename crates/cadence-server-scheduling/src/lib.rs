// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Scheduling side of Cadence.
//!
//! This crate provides:
//! - [`BusinessHoursScheduler`]: when to run a job given every tenant's business hours
//! - [`FleetHealthAggregator`]: fleet-wide classification of job status
//! - [`TriggerCoordinator`]: one tick of decide, guard, start and record
//! - [`WorkflowEngine`] and [`TenantDirectory`]: contracts with external systems
//! - [`maintenance`]: periodic stuck-run sweep and fleet health scan

pub mod business_hours;
pub mod coordinator;
pub mod directory;
pub mod engine;
pub mod error;
pub mod health;
pub mod maintenance;

#[cfg(test)]
pub(crate) mod testing;

pub use business_hours::{BusinessHoursScheduler, ScheduleDecision, DEFAULT_CATCH_UP_WINDOW_HOURS};
pub use coordinator::{
	RunOutcome, TenantRunOutcome, TenantTriggerResult, TriggerCoordinator, TriggerOptions,
	TriggerReport,
};
pub use directory::{load_tenant_hours, FileTenantDirectory, StaticTenantDirectory, TenantDirectory};
pub use engine::{
	next_fire_after, validate_cron_expression, validate_timezone, RecurringSchedule, WorkflowEngine,
};
pub use error::{Result, SchedulingError};
pub use health::{
	FleetHealthAggregator, FleetHealthReport, HealthIssue, HealthThresholds, IssueKind, Severity,
	WorkflowHealth,
};
pub use maintenance::{
	FleetHealthTask, MaintenanceRunner, MaintenanceTask, StopSignal, StuckSweepTask,
	TaskContext, TaskError, TaskOutput, TaskRunSummary, TriggerSource,
};
