// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite implementation of [`StatusStore`].

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use tracing::instrument;

use cadence_jobs_core::{JobType, RunStatus, RunStatusRecord, TenantId};

use crate::error::{Result, StatusError};
use crate::store::StatusStore;

#[derive(Clone)]
pub struct SqliteStatusStore {
	pool: SqlitePool,
}

impl SqliteStatusStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

#[async_trait]
impl StatusStore for SqliteStatusStore {
	#[instrument(skip(self, records), fields(count = records.len()))]
	async fn upsert_status(&self, records: &[RunStatusRecord]) -> Result<()> {
		let mut tx = self.pool.begin().await?;

		for record in records {
			sqlx::query(
				r#"
				INSERT INTO run_status (
					tenant_id, job_type, schedule_id,
					run_id, status,
					last_run, next_run,
					error_message, retry_count,
					updated_at
				)
				VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
				ON CONFLICT(tenant_id, job_type, schedule_id) DO UPDATE SET
					run_id = COALESCE(excluded.run_id, run_status.run_id),
					status = excluded.status,
					last_run = COALESCE(excluded.last_run, run_status.last_run),
					next_run = COALESCE(excluded.next_run, run_status.next_run),
					error_message = excluded.error_message,
					retry_count = excluded.retry_count,
					updated_at = excluded.updated_at
				"#,
			)
			.bind(record.tenant_id.as_str())
			.bind(record.job_type.as_str())
			.bind(record.schedule_id.as_deref().unwrap_or(""))
			.bind(&record.run_id)
			.bind(record.status.as_str())
			.bind(record.last_run.map(format_timestamp))
			.bind(record.next_run.map(format_timestamp))
			.bind(&record.error_message)
			.bind(record.retry_count as i64)
			.bind(format_timestamp(record.updated_at))
			.execute(&mut *tx)
			.await?;
		}

		tx.commit().await?;
		Ok(())
	}

	#[instrument(skip(self, tenant_ids), fields(job_type = %job_type, tenants = tenant_ids.len()))]
	async fn query_status(
		&self,
		job_type: &JobType,
		tenant_ids: &[TenantId],
	) -> Result<Vec<RunStatusRecord>> {
		if tenant_ids.is_empty() {
			return Ok(Vec::new());
		}

		let placeholders = vec!["?"; tenant_ids.len()].join(", ");
		let sql = format!(
			r#"
			SELECT tenant_id, job_type, schedule_id,
				   run_id, status,
				   last_run, next_run,
				   error_message, retry_count,
				   updated_at
			FROM run_status
			WHERE job_type = ? AND tenant_id IN ({placeholders})
			ORDER BY tenant_id ASC, schedule_id ASC
			"#
		);

		let mut query = sqlx::query_as::<_, RunStatusRow>(&sql).bind(job_type.as_str());
		for tenant_id in tenant_ids {
			query = query.bind(tenant_id.as_str());
		}

		let rows = query.fetch_all(&self.pool).await?;
		rows.into_iter().map(TryInto::try_into).collect()
	}

	#[instrument(skip(self))]
	async fn query_stuck(
		&self,
		hours_threshold: f64,
		now: DateTime<Utc>,
	) -> Result<Vec<RunStatusRecord>> {
		let rows = sqlx::query_as::<_, RunStatusRow>(
			r#"
			SELECT tenant_id, job_type, schedule_id,
				   run_id, status,
				   last_run, next_run,
				   error_message, retry_count,
				   updated_at
			FROM run_status
			WHERE status = 'RUNNING'
			ORDER BY updated_at ASC
			"#,
		)
		.fetch_all(&self.pool)
		.await?;

		// Age is compared on parsed timestamps rather than SQLite's
		// second-resolution datetime().
		let mut stuck = Vec::new();
		for row in rows {
			let record: RunStatusRecord = row.try_into()?;
			if record.is_stuck(now, hours_threshold) {
				stuck.push(record);
			}
		}
		Ok(stuck)
	}

	async fn is_reachable(&self) -> bool {
		sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
	}
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
	dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|_| StatusError::Internal(format!("Invalid {field}: {value}")))
}

// Database row types for sqlx

#[derive(sqlx::FromRow)]
struct RunStatusRow {
	tenant_id: String,
	job_type: String,
	schedule_id: String,
	run_id: Option<String>,
	status: String,
	last_run: Option<String>,
	next_run: Option<String>,
	error_message: Option<String>,
	retry_count: i64,
	updated_at: String,
}

impl TryFrom<RunStatusRow> for RunStatusRecord {
	type Error = StatusError;

	fn try_from(row: RunStatusRow) -> Result<Self> {
		Ok(RunStatusRecord {
			tenant_id: TenantId(row.tenant_id),
			job_type: JobType(row.job_type),
			schedule_id: Some(row.schedule_id).filter(|s| !s.is_empty()),
			run_id: row.run_id,
			status: row
				.status
				.parse::<RunStatus>()
				.map_err(|_| StatusError::Internal(format!("Invalid status: {}", row.status)))?,
			last_run: row
				.last_run
				.map(|s| parse_timestamp("last_run", &s))
				.transpose()?,
			next_run: row
				.next_run
				.map(|s| parse_timestamp("next_run", &s))
				.transpose()?,
			error_message: row.error_message,
			retry_count: row.retry_count.max(0) as u32,
			updated_at: parse_timestamp("updated_at", &row.updated_at)?,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;
	use chrono::{Duration, TimeZone};

	fn record(tenant: &str, status: RunStatus, updated_at: DateTime<Utc>) -> RunStatusRecord {
		RunStatusRecord {
			tenant_id: TenantId::new(tenant),
			job_type: JobType::new("email-sync"),
			schedule_id: None,
			run_id: Some(format!("run-{tenant}")),
			status,
			last_run: None,
			next_run: None,
			error_message: None,
			retry_count: 0,
			updated_at,
		}
	}

	fn now() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
	}

	#[tokio::test]
	async fn test_upsert_and_query() {
		let store = SqliteStatusStore::new(create_test_pool().await);
		store
			.upsert_status(&[record("site-1", RunStatus::Running, now())])
			.await
			.unwrap();

		let rows = store
			.query_status(&JobType::new("email-sync"), &[TenantId::new("site-1")])
			.await
			.unwrap();
		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0].status, RunStatus::Running);
		assert_eq!(rows[0].schedule_id, None);
		assert_eq!(rows[0].updated_at, now());
	}

	#[tokio::test]
	async fn test_upsert_keeps_one_row_per_key() {
		let store = SqliteStatusStore::new(create_test_pool().await);
		store
			.upsert_status(&[record("site-1", RunStatus::Running, now())])
			.await
			.unwrap();
		store
			.upsert_status(&[record("site-1", RunStatus::Completed, now())])
			.await
			.unwrap();

		let rows = store
			.query_status(&JobType::new("email-sync"), &[TenantId::new("site-1")])
			.await
			.unwrap();
		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0].status, RunStatus::Completed);
	}

	#[tokio::test]
	async fn test_schedule_id_separates_rows() {
		let store = SqliteStatusStore::new(create_test_pool().await);
		let mut morning = record("site-1", RunStatus::Completed, now());
		morning.schedule_id = Some("morning".to_string());
		let mut evening = record("site-1", RunStatus::Running, now());
		evening.schedule_id = Some("evening".to_string());
		store.upsert_status(&[morning, evening]).await.unwrap();

		let rows = store
			.query_status(&JobType::new("email-sync"), &[TenantId::new("site-1")])
			.await
			.unwrap();
		assert_eq!(rows.len(), 2);
		assert_eq!(rows[0].schedule_id.as_deref(), Some("evening"));
		assert_eq!(rows[1].schedule_id.as_deref(), Some("morning"));
	}

	#[tokio::test]
	async fn test_upsert_preserves_unset_last_run() {
		let store = SqliteStatusStore::new(create_test_pool().await);
		let earlier = now() - Duration::hours(3);
		let mut completed = record("site-1", RunStatus::Completed, earlier);
		completed.last_run = Some(earlier);
		store.upsert_status(&[completed]).await.unwrap();

		let mut running = record("site-1", RunStatus::Running, now());
		running.run_id = None;
		store.upsert_status(&[running]).await.unwrap();

		let rows = store
			.query_status(&JobType::new("email-sync"), &[TenantId::new("site-1")])
			.await
			.unwrap();
		assert_eq!(rows[0].status, RunStatus::Running);
		assert_eq!(rows[0].last_run, Some(earlier));
		assert_eq!(rows[0].run_id.as_deref(), Some("run-site-1"));
	}

	#[tokio::test]
	async fn test_query_filters_by_tenant_and_job_type() {
		let store = SqliteStatusStore::new(create_test_pool().await);
		let mut other_job = record("site-1", RunStatus::Running, now());
		other_job.job_type = JobType::new("lead-scoring");
		store
			.upsert_status(&[
				record("site-1", RunStatus::Running, now()),
				record("site-2", RunStatus::Running, now()),
				other_job,
			])
			.await
			.unwrap();

		let rows = store
			.query_status(&JobType::new("email-sync"), &[TenantId::new("site-2")])
			.await
			.unwrap();
		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0].tenant_id.as_str(), "site-2");

		let rows = store
			.query_status(&JobType::new("email-sync"), &[])
			.await
			.unwrap();
		assert!(rows.is_empty());
	}

	#[tokio::test]
	async fn test_query_stuck_uses_threshold() {
		let store = SqliteStatusStore::new(create_test_pool().await);
		store
			.upsert_status(&[
				record("old", RunStatus::Running, now() - Duration::hours(30)),
				record("recent", RunStatus::Running, now() - Duration::hours(1)),
				record("done", RunStatus::Completed, now() - Duration::hours(30)),
			])
			.await
			.unwrap();

		let stuck = store.query_stuck(6.0, now()).await.unwrap();
		assert_eq!(stuck.len(), 1);
		assert_eq!(stuck[0].tenant_id.as_str(), "old");
	}

	#[tokio::test]
	async fn test_closed_pool_is_unreachable() {
		let pool = create_test_pool().await;
		let store = SqliteStatusStore::new(pool.clone());
		assert!(store.is_reachable().await);

		pool.close().await;
		assert!(!store.is_reachable().await);
		assert!(store
			.query_status(&JobType::new("email-sync"), &[TenantId::new("site-1")])
			.await
			.is_err());
	}
}
