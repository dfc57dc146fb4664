// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Periodic maintenance: the stuck-run sweep and the fleet health scan.

pub mod context;
pub mod fleet_health;
pub mod runner;
pub mod stuck_sweep;
pub mod task;

pub use context::{StopSignal, TaskContext, TriggerSource};
pub use fleet_health::FleetHealthTask;
pub use runner::{MaintenanceRunner, RunOutcome, TaskRunSummary};
pub use stuck_sweep::StuckSweepTask;
pub use task::{MaintenanceTask, TaskError, TaskOutput};
