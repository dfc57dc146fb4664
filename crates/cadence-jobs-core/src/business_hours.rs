// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-tenant business hours.
//!
//! Tenant configuration arrives in one of two shapes: a list of named
//! schedules, each with a map of day entries, or a single flat map keyed by
//! day name. [`RawBusinessHours`] accepts both and [`TenantBusinessHours`] is
//! the normalized form the scheduler works with.

use chrono::{NaiveTime, Weekday};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

use crate::error::{JobsCoreError, Result};
use crate::record::TenantId;

/// Opening hours of a single weekday.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayHours {
	pub enabled: bool,
	pub open: Option<NaiveTime>,
	pub close: Option<NaiveTime>,
	/// IANA timezone name, e.g. `Europe/Berlin`.
	pub timezone: Option<String>,
}

impl DayHours {
	pub fn new(open: NaiveTime, close: NaiveTime) -> Self {
		Self {
			enabled: true,
			open: Some(open),
			close: Some(close),
			timezone: None,
		}
	}

	pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
		self.timezone = Some(timezone.into());
		self
	}

	/// Open today: enabled, both bounds set and distinct.
	pub fn is_open_day(&self) -> bool {
		match (self.open, self.close) {
			(Some(open), Some(close)) => self.enabled && open != close,
			_ => false,
		}
	}
}

/// A named weekday -> hours map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaySchedule {
	pub name: String,
	pub days: HashMap<Weekday, DayHours>,
}

/// All business-hours schedules of one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantBusinessHours {
	pub tenant_id: TenantId,
	pub schedules: Vec<DaySchedule>,
}

impl TenantBusinessHours {
	/// A tenant without any day-schedule falls back to the weekday policy.
	pub fn unconfigured(tenant_id: impl Into<TenantId>) -> Self {
		Self {
			tenant_id: tenant_id.into(),
			schedules: Vec::new(),
		}
	}

	/// Single-schedule tenant open with the same hours on every listed day.
	pub fn uniform(
		tenant_id: impl Into<TenantId>,
		days: &[Weekday],
		hours: DayHours,
	) -> Self {
		let days = days.iter().map(|day| (*day, hours.clone())).collect();
		Self {
			tenant_id: tenant_id.into(),
			schedules: vec![DaySchedule {
				name: "default".to_string(),
				days,
			}],
		}
	}

	/// True when at least one schedule has day entries.
	pub fn has_usable_schedule(&self) -> bool {
		self.schedules.iter().any(|s| !s.days.is_empty())
	}

	/// The first timezone named by any day entry.
	pub fn timezone(&self) -> Option<&str> {
		self
			.schedules
			.iter()
			.flat_map(|s| s.days.values())
			.filter_map(|d| d.timezone.as_deref())
			.map(str::trim)
			.find(|tz| !tz.is_empty())
	}

	/// Day entries for `weekday` across all schedules.
	pub fn hours_for(&self, weekday: Weekday) -> Vec<&DayHours> {
		self
			.schedules
			.iter()
			.filter_map(|s| s.days.get(&weekday))
			.collect()
	}

	pub fn from_raw(tenant_id: impl Into<TenantId>, raw: RawBusinessHours) -> Self {
		let schedules = match raw {
			RawBusinessHours::Schedules(list) => list
				.into_iter()
				.enumerate()
				.map(|(i, s)| DaySchedule {
					name: s.name.unwrap_or_else(|| format!("schedule-{}", i + 1)),
					days: normalize_days(s.days),
				})
				.collect(),
			RawBusinessHours::DayMap(days) => {
				let days = normalize_days(days);
				if days.is_empty() {
					Vec::new()
				} else {
					vec![DaySchedule {
						name: "default".to_string(),
						days,
					}]
				}
			}
		};

		Self {
			tenant_id: tenant_id.into(),
			schedules,
		}
	}

	/// Parse either raw shape from JSON. `null` means unconfigured.
	pub fn from_json(tenant_id: impl Into<TenantId>, value: serde_json::Value) -> Result<Self> {
		if value.is_null() {
			return Ok(Self::unconfigured(tenant_id));
		}
		let raw: RawBusinessHours = serde_json::from_value(value)
			.map_err(|e| JobsCoreError::InvalidBusinessHours(e.to_string()))?;
		Ok(Self::from_raw(tenant_id, raw))
	}
}

/// Business hours as they arrive from tenant configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawBusinessHours {
	Schedules(Vec<RawDaySchedule>),
	DayMap(BTreeMap<String, RawDayHours>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawDaySchedule {
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default, alias = "schedule", alias = "hours")]
	pub days: BTreeMap<String, RawDayHours>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDayHours {
	#[serde(default)]
	pub enabled: Option<bool>,
	#[serde(default, alias = "openTime", alias = "start")]
	pub open: Option<String>,
	#[serde(default, alias = "closeTime", alias = "end")]
	pub close: Option<String>,
	#[serde(default, alias = "tz")]
	pub timezone: Option<String>,
}

fn normalize_days(raw: BTreeMap<String, RawDayHours>) -> HashMap<Weekday, DayHours> {
	raw
		.into_iter()
		.filter_map(|(name, day)| {
			let weekday = name.trim().parse::<Weekday>().ok()?;
			Some((
				weekday,
				DayHours {
					// Only an explicit `false` disables a day.
					enabled: day.enabled != Some(false),
					open: day.open.as_deref().and_then(parse_time),
					close: day.close.as_deref().and_then(parse_time),
					timezone: day.timezone.filter(|tz| !tz.trim().is_empty()),
				},
			))
		})
		.collect()
}

/// Accepts `HH:MM` and `HH:MM:SS`.
pub fn parse_time(s: &str) -> Option<NaiveTime> {
	let s = s.trim();
	NaiveTime::parse_from_str(s, "%H:%M")
		.or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
		.ok()
}
