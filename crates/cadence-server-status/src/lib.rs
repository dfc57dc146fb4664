// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Run-status tracking for multi-tenant scheduled jobs.
//!
//! This crate provides:
//! - [`StatusStore`] and its SQLite implementation [`SqliteStatusStore`]
//! - [`RunStatusRegistry`]: allow-list enforcing wrapper used for all writes
//! - [`RunEligibilityEvaluator`]: "has it been long enough since the last run?"
//! - [`StuckExecutionDetector`]: periodic sweep and pre-flight guard for runs
//!   left in `RUNNING` after their execution died

pub mod eligibility;
pub mod error;
pub mod pool;
pub mod registry;
pub mod sqlite;
pub mod store;
pub mod stuck;

#[cfg(test)]
pub(crate) mod testing;

pub use eligibility::{EligibilityDecision, RunEligibilityEvaluator};
pub use error::{Result, StatusError};
pub use pool::{create_pool, run_migrations};
pub use registry::{BatchSaveOutcome, RunStatusRegistry, SaveOutcome, SkipReason};
pub use sqlite::SqliteStatusStore;
pub use store::StatusStore;
pub use stuck::{GuardDecision, StuckExecutionDetector, SweepFailure, SweepReport};
