// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for multi-tenant job run tracking.
//!
//! This crate holds the data model shared by the status store, the
//! schedulers and the health aggregator:
//! - [`RunStatusRecord`] / [`RunStatusUpdate`]: one current row per tenant and job type
//! - [`JobTypeAllowList`]: the job types that are allowed to persist status
//! - [`StoreFailurePolicy`]: what to do when the status store is unreachable
//! - [`TenantBusinessHours`]: normalized per-tenant operating hours

pub mod business_hours;
pub mod error;
pub mod policy;
pub mod record;

pub use business_hours::{
	DayHours, DaySchedule, RawBusinessHours, RawDayHours, RawDaySchedule, TenantBusinessHours,
};
pub use error::{JobsCoreError, Result};
pub use policy::{JobTypeAllowList, StoreFailurePolicy, StoreUnavailableBehavior};
pub use record::{JobType, RunStatus, RunStatusRecord, RunStatusUpdate, TenantId};
