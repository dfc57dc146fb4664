// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The partial configuration each source produces.

use serde::Deserialize;

use crate::sections::{
	DatabaseConfigLayer, HealthConfigLayer, LoggingConfigLayer, SchedulingConfigLayer,
	StatusConfigLayer,
};

/// Server configuration with every field optional, merged across sources.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub status: Option<StatusConfigLayer>,
	#[serde(default)]
	pub health: Option<HealthConfigLayer>,
	#[serde(default)]
	pub scheduling: Option<SchedulingConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl ServerConfigLayer {
	/// Overlay `other` on top of `self`; set fields in `other` win.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_section(&mut self.database, other.database, DatabaseConfigLayer::merge);
		merge_section(&mut self.status, other.status, StatusConfigLayer::merge);
		merge_section(&mut self.health, other.health, HealthConfigLayer::merge);
		merge_section(&mut self.scheduling, other.scheduling, SchedulingConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: fn(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(existing), Some(other)) => merge(existing, other),
		(None, Some(other)) => *base = Some(other),
		(_, None) => {}
	}
}
