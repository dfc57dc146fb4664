// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Explicit policy objects passed into the status components at construction.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Behavior when the status store cannot be reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreUnavailableBehavior {
	/// Proceed as if nothing blocks the operation.
	#[default]
	FailOpen,
	/// Surface the outage and refuse to proceed.
	FailClosed,
}

impl fmt::Display for StoreUnavailableBehavior {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::FailOpen => write!(f, "fail_open"),
			Self::FailClosed => write!(f, "fail_closed"),
		}
	}
}

impl FromStr for StoreUnavailableBehavior {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().replace('-', "_").as_str() {
			"fail_open" | "open" => Ok(Self::FailOpen),
			"fail_closed" | "closed" => Ok(Self::FailClosed),
			_ => Err(format!("unknown store failure behavior: {s}")),
		}
	}
}

/// How status-dependent decisions degrade during a store outage.
///
/// Missing a scheduled run is worse than an occasional duplicate, so the
/// default is [`StoreUnavailableBehavior::FailOpen`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreFailurePolicy {
	pub on_store_unavailable: StoreUnavailableBehavior,
}

impl StoreFailurePolicy {
	pub fn fail_open() -> Self {
		Self {
			on_store_unavailable: StoreUnavailableBehavior::FailOpen,
		}
	}

	pub fn fail_closed() -> Self {
		Self {
			on_store_unavailable: StoreUnavailableBehavior::FailClosed,
		}
	}

	pub fn is_fail_open(&self) -> bool {
		self.on_store_unavailable == StoreUnavailableBehavior::FailOpen
	}
}

/// Job types allowed to persist run status (the cron-scheduled jobs).
///
/// Built once from configuration or the tenant directory and handed to the
/// registry; updates for any other job type are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobTypeAllowList {
	job_types: BTreeSet<String>,
}

impl JobTypeAllowList {
	pub fn new<I, S>(job_types: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			job_types: job_types
				.into_iter()
				.map(Into::into)
				.map(|s: String| s.trim().to_string())
				.filter(|s| !s.is_empty())
				.collect(),
		}
	}

	pub fn allows(&self, job_type: &str) -> bool {
		self.job_types.contains(job_type)
	}

	pub fn is_empty(&self) -> bool {
		self.job_types.is_empty()
	}

	pub fn len(&self) -> usize {
		self.job_types.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.job_types.iter().map(String::as_str)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_policy_fails_open() {
		assert!(StoreFailurePolicy::default().is_fail_open());
		assert!(!StoreFailurePolicy::fail_closed().is_fail_open());
	}

	#[test]
	fn behavior_parses_common_spellings() {
		assert_eq!(
			"fail-closed".parse::<StoreUnavailableBehavior>().unwrap(),
			StoreUnavailableBehavior::FailClosed
		);
		assert_eq!(
			"FAIL_OPEN".parse::<StoreUnavailableBehavior>().unwrap(),
			StoreUnavailableBehavior::FailOpen
		);
		assert!("maybe".parse::<StoreUnavailableBehavior>().is_err());
	}

	#[test]
	fn allow_list_trims_and_ignores_blanks() {
		let list = JobTypeAllowList::new([" email-sync ", "", "lead-scoring"]);
		assert_eq!(list.len(), 2);
		assert!(list.allows("email-sync"));
		assert!(list.allows("lead-scoring"));
		assert!(!list.allows("content-generation"));
	}

	#[test]
	fn empty_allow_list_allows_nothing() {
		let list = JobTypeAllowList::default();
		assert!(list.is_empty());
		assert!(!list.allows("email-sync"));
	}
}
