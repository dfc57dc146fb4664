// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Decides when a multi-tenant job should run, given every tenant's business
//! hours.
//!
//! Tenants with at least one usable day-schedule are evaluated against their
//! opening windows. Tenants without one fall back to running on weekdays.
//! Each tenant's windows are resolved in the tenant's own timezone and then
//! compared as UTC instants.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, warn};

use cadence_jobs_core::{TenantBusinessHours, TenantId};

pub const DEFAULT_CATCH_UP_WINDOW_HOURS: i64 = 6;

/// How far ahead to look for the next opening.
const LOOKAHEAD_DAYS: i64 = 8;

/// Outcome of one scheduling tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleDecision {
	pub should_execute_now: bool,
	pub should_schedule_for_later: bool,
	/// `HH:MM` in UTC.
	pub next_execution_time: Option<String>,
	pub next_execution_at: Option<DateTime<Utc>>,
	/// Executing after the last window of the day closed.
	pub catch_up: bool,
	pub reason: String,
	/// Tenants the job should run for on this tick.
	pub tenants_to_run: Vec<TenantId>,
}

impl ScheduleDecision {
	fn skip(reason: impl Into<String>) -> Self {
		Self {
			should_execute_now: false,
			should_schedule_for_later: false,
			next_execution_time: None,
			next_execution_at: None,
			catch_up: false,
			reason: reason.into(),
			tenants_to_run: Vec::new(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessHoursScheduler {
	catch_up_window: Duration,
}

impl Default for BusinessHoursScheduler {
	fn default() -> Self {
		Self::new(Duration::hours(DEFAULT_CATCH_UP_WINDOW_HOURS))
	}
}

impl BusinessHoursScheduler {
	pub fn new(catch_up_window: Duration) -> Self {
		Self { catch_up_window }
	}

	pub fn catch_up_window(&self) -> Duration {
		self.catch_up_window
	}

	pub fn decide(&self, now: DateTime<Utc>, tenants: &[TenantBusinessHours]) -> ScheduleDecision {
		let (with_hours, without_hours): (Vec<&TenantBusinessHours>, Vec<&TenantBusinessHours>) =
			tenants.iter().partition(|t| t.has_usable_schedule());

		let hours_outcome = self.business_hours_group(now, &with_hours);
		let fallback_outcome = weekday_fallback_group(now, &without_hours);

		let decision = combine(hours_outcome, fallback_outcome);
		debug!(
			execute_now = decision.should_execute_now,
			schedule_later = decision.should_schedule_for_later,
			tenants = decision.tenants_to_run.len(),
			reason = %decision.reason,
			"schedule decided"
		);
		decision
	}

	fn business_hours_group(
		&self,
		now: DateTime<Utc>,
		tenants: &[&TenantBusinessHours],
	) -> Option<GroupOutcome> {
		if tenants.is_empty() {
			return None;
		}

		let mut today = Vec::new();
		let mut open_now = Vec::new();
		for tenant in tenants {
			let tz = tenant_timezone(tenant);
			let local_today = now.with_timezone(&tz).date_naive();
			let windows = windows_on(tenant, tz, local_today);

			// Overnight windows from yesterday may still be open, or have
			// closed earlier today.
			let carried: Vec<Window<'_>> = local_today
				.pred_opt()
				.map(|yesterday| windows_on(tenant, tz, yesterday))
				.unwrap_or_default()
				.into_iter()
				.filter(|w| w.close_at.with_timezone(&tz).date_naive() == local_today)
				.collect();

			if windows
				.iter()
				.chain(carried.iter())
				.any(|w| w.contains(now))
			{
				push_unique(&mut open_now, &tenant.tenant_id);
			}
			today.extend(windows.into_iter().map(|w| (w, false)));
			today.extend(carried.into_iter().map(|w| (w, true)));
		}

		if !open_now.is_empty() {
			return Some(GroupOutcome::ExecuteNow {
				reason: format!("{} tenant(s) currently within business hours", open_now.len()),
				tenants: open_now,
				catch_up: false,
			});
		}

		// An overnight window that closed a moment ago is caught up even when
		// today's own windows open later.
		let mut overnight_catch_up = Vec::new();
		let mut overnight_close = None;
		for (window, _) in today
			.iter()
			.filter(|(w, carried)| *carried && w.close_at <= now && now - w.close_at <= self.catch_up_window)
		{
			push_unique(&mut overnight_catch_up, window.tenant_id);
			overnight_close = overnight_close.max(Some(window.close_at));
		}
		if let Some(close) = overnight_close {
			return Some(GroupOutcome::ExecuteNow {
				reason: format!(
					"catch-up, {}m after overnight close at {}",
					(now - close).num_minutes(),
					hhmm(close)
				),
				tenants: overnight_catch_up,
				catch_up: true,
			});
		}

		let Some(latest_close) = today.iter().map(|(w, _)| w.close_at).max() else {
			return Some(GroupOutcome::Idle {
				reason: "no tenant with business hours is open today".to_string(),
			});
		};
		// Windows carried over from yesterday opened before today began.
		let earliest_open = today
			.iter()
			.filter(|(_, carried)| !carried)
			.map(|(w, _)| w.open_at)
			.min();

		if let Some(earliest_open) = earliest_open.filter(|open| now < *open) {
			return Some(GroupOutcome::Defer {
				at: earliest_open,
				reason: format!("before earliest opening at {}", hhmm(earliest_open)),
			});
		}

		if now >= latest_close {
			let since_close = now - latest_close;
			if since_close <= self.catch_up_window {
				let mut tenants_to_run = Vec::new();
				for (window, _) in today
					.iter()
					.filter(|(w, _)| w.close_at <= now && now - w.close_at <= self.catch_up_window)
				{
					push_unique(&mut tenants_to_run, window.tenant_id);
				}
				return Some(GroupOutcome::ExecuteNow {
					reason: format!(
						"catch-up, {}m after latest close at {}",
						since_close.num_minutes(),
						hhmm(latest_close)
					),
					tenants: tenants_to_run,
					catch_up: true,
				});
			}

			let at = next_open_after(now, tenants)
				.unwrap_or(earliest_open.unwrap_or(latest_close) + Duration::days(1));
			return Some(GroupOutcome::Defer {
				at,
				reason: format!(
					"{}m after latest close at {} exceeds catch-up window, next opening at {}",
					since_close.num_minutes(),
					hhmm(latest_close),
					hhmm(at)
				),
			});
		}

		let at = next_open_after(now, tenants).unwrap_or(latest_close);
		Some(GroupOutcome::Defer {
			at,
			reason: format!("between business-hours windows, next opening at {}", hhmm(at)),
		})
	}
}

enum GroupOutcome {
	Idle {
		reason: String,
	},
	ExecuteNow {
		tenants: Vec<TenantId>,
		catch_up: bool,
		reason: String,
	},
	Defer {
		at: DateTime<Utc>,
		reason: String,
	},
}

impl GroupOutcome {
	fn reason(&self) -> &str {
		match self {
			Self::Idle { reason } | Self::ExecuteNow { reason, .. } | Self::Defer { reason, .. } => {
				reason.as_str()
			}
		}
	}
}

fn weekday_fallback_group(
	now: DateTime<Utc>,
	tenants: &[&TenantBusinessHours],
) -> Option<GroupOutcome> {
	if tenants.is_empty() {
		return None;
	}

	let weekday = now.weekday();
	if is_weekday(weekday) {
		Some(GroupOutcome::ExecuteNow {
			tenants: tenants.iter().map(|t| t.tenant_id.clone()).collect(),
			catch_up: false,
			reason: format!(
				"{} tenant(s) without business hours run on weekdays",
				tenants.len()
			),
		})
	} else {
		Some(GroupOutcome::Idle {
			reason: format!(
				"{} tenant(s) without business hours skip {weekday}",
				tenants.len()
			),
		})
	}
}

/// OR the two groups together; the reason names every group that has tenants.
fn combine(hours: Option<GroupOutcome>, fallback: Option<GroupOutcome>) -> ScheduleDecision {
	if hours.is_none() && fallback.is_none() {
		return ScheduleDecision::skip("no tenants to schedule");
	}

	let mut decision = ScheduleDecision::skip(String::new());
	let mut reasons = Vec::new();

	for (label, outcome) in [("business hours", hours), ("weekday fallback", fallback)] {
		let Some(outcome) = outcome else {
			continue;
		};
		reasons.push(format!("{label}: {}", outcome.reason()));
		match outcome {
			GroupOutcome::Idle { .. } => {}
			GroupOutcome::ExecuteNow {
				tenants, catch_up, ..
			} => {
				decision.should_execute_now = true;
				decision.catch_up |= catch_up;
				for tenant in &tenants {
					push_unique(&mut decision.tenants_to_run, tenant);
				}
			}
			GroupOutcome::Defer { at, .. } => {
				decision.should_schedule_for_later = true;
				decision.next_execution_at = Some(at);
				decision.next_execution_time = Some(hhmm(at));
			}
		}
	}

	decision.reason = reasons.join("; ");
	decision
}

struct Window<'a> {
	tenant_id: &'a TenantId,
	open_at: DateTime<Utc>,
	close_at: DateTime<Utc>,
}

impl Window<'_> {
	fn contains(&self, now: DateTime<Utc>) -> bool {
		self.open_at <= now && now < self.close_at
	}
}

fn windows_on(tenant: &TenantBusinessHours, tz: Tz, date: NaiveDate) -> Vec<Window<'_>> {
	tenant
		.hours_for(date.weekday())
		.into_iter()
		.filter(|hours| hours.is_open_day())
		.filter_map(|hours| {
			let (open, close) = (hours.open?, hours.close?);
			// A close before the open runs past midnight.
			let close_date = if close > open { date } else { date.succ_opt()? };
			Some(Window {
				tenant_id: &tenant.tenant_id,
				open_at: localize(tz, date, open)?,
				close_at: localize(tz, close_date, close)?,
			})
		})
		.collect()
}

fn next_open_after(now: DateTime<Utc>, tenants: &[&TenantBusinessHours]) -> Option<DateTime<Utc>> {
	tenants
		.iter()
		.flat_map(|tenant| {
			let tenant: &TenantBusinessHours = *tenant;
			let tz = tenant_timezone(tenant);
			let local_today = now.with_timezone(&tz).date_naive();
			(0..LOOKAHEAD_DAYS)
				.filter_map(move |offset| local_today.checked_add_signed(Duration::days(offset)))
				.flat_map(move |date| windows_on(tenant, tz, date))
				.map(|w| w.open_at)
		})
		.filter(|open_at| *open_at > now)
		.min()
}

fn tenant_timezone(tenant: &TenantBusinessHours) -> Tz {
	match tenant.timezone() {
		None => Tz::UTC,
		Some(name) => name.parse::<Tz>().unwrap_or_else(|_| {
			warn!(tenant_id = %tenant.tenant_id, timezone = name, "Unknown timezone, using UTC");
			Tz::UTC
		}),
	}
}

/// Local wall-clock time to UTC. Times inside a DST gap move forward an hour.
fn localize(tz: Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
	let naive = date.and_time(time);
	tz.from_local_datetime(&naive)
		.earliest()
		.or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
		.map(|dt| dt.with_timezone(&Utc))
}

fn is_weekday(day: Weekday) -> bool {
	!matches!(day, Weekday::Sat | Weekday::Sun)
}

fn hhmm(at: DateTime<Utc>) -> String {
	at.format("%H:%M").to_string()
}

fn push_unique(ids: &mut Vec<TenantId>, id: &TenantId) {
	if !ids.contains(id) {
		ids.push(id.clone());
	}
}
