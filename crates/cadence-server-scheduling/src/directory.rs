// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Where tenants, their business hours and the tracked job types come from.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use cadence_jobs_core::{JobTypeAllowList, TenantBusinessHours, TenantId};

use crate::error::{Result, SchedulingError};

#[async_trait]
pub trait TenantDirectory: Send + Sync {
	async fn list_tenant_ids(&self) -> Result<Vec<TenantId>>;

	/// Business hours of the requested tenants. Unknown ids are left out.
	async fn fetch_business_hours(&self, tenant_ids: &[TenantId]) -> Result<Vec<TenantBusinessHours>>;

	async fn fetch_allowed_job_types(&self) -> Result<JobTypeAllowList>;
}

/// A fixed set of tenants held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticTenantDirectory {
	tenants: Vec<TenantBusinessHours>,
	allowed_job_types: JobTypeAllowList,
}

impl StaticTenantDirectory {
	pub fn new(tenants: Vec<TenantBusinessHours>, allowed_job_types: JobTypeAllowList) -> Self {
		Self {
			tenants,
			allowed_job_types,
		}
	}
}

#[async_trait]
impl TenantDirectory for StaticTenantDirectory {
	async fn list_tenant_ids(&self) -> Result<Vec<TenantId>> {
		Ok(self.tenants.iter().map(|t| t.tenant_id.clone()).collect())
	}

	async fn fetch_business_hours(&self, tenant_ids: &[TenantId]) -> Result<Vec<TenantBusinessHours>> {
		Ok(select(&self.tenants, tenant_ids))
	}

	async fn fetch_allowed_job_types(&self) -> Result<JobTypeAllowList> {
		Ok(self.allowed_job_types.clone())
	}
}

#[derive(Debug, Deserialize)]
struct DirectoryDocument {
	#[serde(default)]
	allowed_job_types: Vec<String>,
	#[serde(default)]
	tenants: Vec<TenantEntry>,
}

#[derive(Debug, Deserialize)]
struct TenantEntry {
	tenant_id: String,
	#[serde(default)]
	business_hours: serde_json::Value,
}

/// Tenant directory backed by a JSON document on disk, re-read on every call.
///
/// ```json
/// {
///   "allowed_job_types": ["email-sync"],
///   "tenants": [{ "tenant_id": "site-1", "business_hours": { "monday": { "open": "09:00", "close": "17:00" } } }]
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileTenantDirectory {
	path: PathBuf,
}

impl FileTenantDirectory {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	#[instrument(skip(self), fields(path = %self.path.display()))]
	async fn load(&self) -> Result<(Vec<TenantBusinessHours>, JobTypeAllowList)> {
		let content = tokio::fs::read_to_string(&self.path)
			.await
			.map_err(|e| SchedulingError::DirectoryRead {
				path: self.path.clone(),
				source: e,
			})?;
		let document: DirectoryDocument =
			serde_json::from_str(&content).map_err(|e| SchedulingError::DirectoryParse {
				path: self.path.clone(),
				source: e,
			})?;

		let tenants = document
			.tenants
			.into_iter()
			.map(|entry| {
				let tenant_id = TenantId::new(entry.tenant_id);
				// A malformed schedule must not hide the tenant; it falls back to weekdays.
				TenantBusinessHours::from_json(tenant_id.clone(), entry.business_hours).unwrap_or_else(|e| {
					warn!(tenant_id = %tenant_id, error = %e, "Ignoring malformed business hours");
					TenantBusinessHours::unconfigured(tenant_id)
				})
			})
			.collect::<Vec<_>>();

		debug!(tenants = tenants.len(), "tenant directory loaded");
		Ok((tenants, JobTypeAllowList::new(document.allowed_job_types)))
	}
}

#[async_trait]
impl TenantDirectory for FileTenantDirectory {
	async fn list_tenant_ids(&self) -> Result<Vec<TenantId>> {
		let (tenants, _) = self.load().await?;
		Ok(tenants.into_iter().map(|t| t.tenant_id).collect())
	}

	async fn fetch_business_hours(&self, tenant_ids: &[TenantId]) -> Result<Vec<TenantBusinessHours>> {
		let (tenants, _) = self.load().await?;
		Ok(select(&tenants, tenant_ids))
	}

	async fn fetch_allowed_job_types(&self) -> Result<JobTypeAllowList> {
		let (_, allowed) = self.load().await?;
		Ok(allowed)
	}
}

/// Business hours for every listed tenant. Tenants the directory lists but has
/// no hours for fall back to [`TenantBusinessHours::unconfigured`].
#[instrument(skip(directory))]
pub async fn load_tenant_hours(directory: &dyn TenantDirectory) -> Result<Vec<TenantBusinessHours>> {
	let tenant_ids = directory.list_tenant_ids().await?;
	let mut tenants = directory.fetch_business_hours(&tenant_ids).await?;
	for tenant_id in &tenant_ids {
		if !tenants.iter().any(|t| &t.tenant_id == tenant_id) {
			debug!(tenant_id = %tenant_id, "tenant has no business hours, using weekday policy");
			tenants.push(TenantBusinessHours::unconfigured(tenant_id.clone()));
		}
	}
	Ok(tenants)
}

fn select(tenants: &[TenantBusinessHours], tenant_ids: &[TenantId]) -> Vec<TenantBusinessHours> {
	tenants
		.iter()
		.filter(|t| tenant_ids.contains(&t.tenant_id))
		.cloned()
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Weekday;
	use std::io::Write;
	use tempfile::NamedTempFile;

	fn write_directory(content: &str) -> NamedTempFile {
		let mut file = NamedTempFile::new().unwrap();
		file.write_all(content.as_bytes()).unwrap();
		file
	}

	const DOCUMENT: &str = r#"{
		"allowed_job_types": ["email-sync", "lead-scoring"],
		"tenants": [
			{
				"tenant_id": "site-1",
				"business_hours": [
					{ "name": "office", "days": { "monday": { "open": "09:00", "close": "17:00", "timezone": "Europe/Berlin" } } }
				]
			},
			{
				"tenant_id": "site-2",
				"business_hours": { "tuesday": { "openTime": "08:00", "closeTime": "12:00" } }
			},
			{ "tenant_id": "site-3" },
			{ "tenant_id": "site-4", "business_hours": "always" }
		]
	}"#;

	#[tokio::test]
	async fn test_file_directory_reads_both_shapes() {
		let file = write_directory(DOCUMENT);
		let directory = FileTenantDirectory::new(file.path());

		let ids = directory.list_tenant_ids().await.unwrap();
		assert_eq!(ids.len(), 4);

		let hours = directory.fetch_business_hours(&ids).await.unwrap();
		assert_eq!(hours[0].timezone(), Some("Europe/Berlin"));
		assert_eq!(hours[0].hours_for(Weekday::Mon).len(), 1);
		assert_eq!(hours[1].hours_for(Weekday::Tue).len(), 1);
		assert!(!hours[2].has_usable_schedule());
		assert!(!hours[3].has_usable_schedule());

		let allowed = directory.fetch_allowed_job_types().await.unwrap();
		assert!(allowed.allows("email-sync"));
		assert!(!allowed.allows("content-generation"));
	}

	#[tokio::test]
	async fn test_fetch_business_hours_skips_unknown_ids() {
		let file = write_directory(DOCUMENT);
		let directory = FileTenantDirectory::new(file.path());

		let hours = directory
			.fetch_business_hours(&[TenantId::new("site-2"), TenantId::new("site-99")])
			.await
			.unwrap();
		assert_eq!(hours.len(), 1);
		assert_eq!(hours[0].tenant_id, TenantId::new("site-2"));
	}

	#[tokio::test]
	async fn test_missing_file_is_an_error() {
		let directory = FileTenantDirectory::new("/nonexistent/tenants.json");
		assert!(matches!(
			directory.list_tenant_ids().await,
			Err(SchedulingError::DirectoryRead { .. })
		));
	}

	#[tokio::test]
	async fn test_malformed_document_is_an_error() {
		let file = write_directory("{ not json");
		let directory = FileTenantDirectory::new(file.path());
		assert!(matches!(
			directory.fetch_allowed_job_types().await,
			Err(SchedulingError::DirectoryParse { .. })
		));
	}

	#[tokio::test]
	async fn test_static_directory() {
		let directory = StaticTenantDirectory::new(
			vec![TenantBusinessHours::unconfigured("site-1")],
			JobTypeAllowList::new(["email-sync"]),
		);
		assert_eq!(directory.list_tenant_ids().await.unwrap(), vec![TenantId::new("site-1")]);
		assert_eq!(directory.fetch_allowed_job_types().await.unwrap().len(), 1);
	}

	/// Lists more tenants than it has hours for.
	struct PartialDirectory {
		hours: Vec<TenantBusinessHours>,
		ids: Vec<TenantId>,
	}

	#[async_trait]
	impl TenantDirectory for PartialDirectory {
		async fn list_tenant_ids(&self) -> Result<Vec<TenantId>> {
			Ok(self.ids.clone())
		}

		async fn fetch_business_hours(&self, tenant_ids: &[TenantId]) -> Result<Vec<TenantBusinessHours>> {
			Ok(select(&self.hours, tenant_ids))
		}

		async fn fetch_allowed_job_types(&self) -> Result<JobTypeAllowList> {
			Ok(JobTypeAllowList::default())
		}
	}

	#[tokio::test]
	async fn test_load_tenant_hours_fills_in_unconfigured_tenants() {
		let configured = TenantBusinessHours::from_json(
			"site-1",
			serde_json::json!({"monday": {"open": "09:00", "close": "17:00"}}),
		)
		.unwrap();
		let directory = PartialDirectory {
			hours: vec![configured.clone()],
			ids: vec![TenantId::new("site-1"), TenantId::new("site-2")],
		};

		let tenants = load_tenant_hours(&directory).await.unwrap();
		assert_eq!(tenants.len(), 2);
		assert!(tenants.contains(&configured));
		assert!(tenants.contains(&TenantBusinessHours::unconfigured("site-2")));
	}

	#[tokio::test]
	async fn test_load_tenant_hours_propagates_directory_errors() {
		let directory = FileTenantDirectory::new("/nonexistent/cadence/tenants.json");
		assert!(matches!(
			load_tenant_hours(&directory).await,
			Err(SchedulingError::DirectoryRead { .. })
		));
	}
}
