// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite-backed schedule store.

use async_trait::async_trait;
use bastion_scheduler_core::{NamespaceId, Schedule};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use crate::error::{Result, SchedulerError};
use crate::spec::validate_timer_spec;
use crate::store::{ScheduleStore, SchemaInitializer};

/// Fields an operator supplies for a new schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSchedule {
	pub cron_expr: String,
	pub action: String,
	pub payload: String,
	pub description: String,
}

/// Schedule store over a single `schedules` table, partitioned by namespace.
#[derive(Clone)]
pub struct SqliteScheduleStore {
	pool: SqlitePool,
}

impl SqliteScheduleStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert an enabled schedule after validating its timer spec and payload.
	#[instrument(skip(self, namespace, new), fields(namespace = %namespace, action = %new.action))]
	pub async fn create_schedule(&self, namespace: &NamespaceId, new: NewSchedule) -> Result<Schedule> {
		validate_timer_spec(&new.cron_expr)?;

		let now = Utc::now();
		let mut schedule = Schedule {
			id: 0,
			cron_expr: new.cron_expr,
			action: new.action,
			payload: new.payload,
			description: new.description,
			is_enabled: true,
			created_at: now,
			updated_at: now,
		};
		schedule.payload_object()?;

		let result = sqlx::query(
			r#"
			INSERT INTO schedules (
				namespace, cron_expr, action, payload, description,
				is_enabled, created_at, updated_at
			)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(namespace.as_str())
		.bind(&schedule.cron_expr)
		.bind(&schedule.action)
		.bind(&schedule.payload)
		.bind(&schedule.description)
		.bind(schedule.is_enabled)
		.bind(schedule.created_at.to_rfc3339())
		.bind(schedule.updated_at.to_rfc3339())
		.execute(&self.pool)
		.await?;

		schedule.id = result.last_insert_rowid();
		debug!(schedule_id = schedule.id, "schedule created");
		Ok(schedule)
	}

	/// Returns `false` when no such schedule exists in the namespace.
	#[instrument(skip(self, namespace), fields(namespace = %namespace))]
	pub async fn set_enabled(&self, namespace: &NamespaceId, id: i64, enabled: bool) -> Result<bool> {
		let result = sqlx::query(
			r#"
			UPDATE schedules
			SET is_enabled = ?, updated_at = ?
			WHERE namespace = ? AND id = ?
			"#,
		)
		.bind(enabled)
		.bind(Utc::now().to_rfc3339())
		.bind(namespace.as_str())
		.bind(id)
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() > 0)
	}

	#[instrument(skip(self, namespace), fields(namespace = %namespace))]
	pub async fn delete_schedule(&self, namespace: &NamespaceId, id: i64) -> Result<bool> {
		let result = sqlx::query("DELETE FROM schedules WHERE namespace = ? AND id = ?")
			.bind(namespace.as_str())
			.bind(id)
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}
}

#[async_trait]
impl ScheduleStore for SqliteScheduleStore {
	#[instrument(skip(self, namespace), fields(namespace = %namespace))]
	async fn list_enabled_schedules(&self, namespace: &NamespaceId) -> Result<Vec<Schedule>> {
		let rows = sqlx::query_as::<_, ScheduleRow>(
			r#"
			SELECT id, cron_expr, action, payload, description,
				   is_enabled, created_at, updated_at
			FROM schedules
			WHERE namespace = ? AND is_enabled = 1
			ORDER BY id ASC
			"#,
		)
		.bind(namespace.as_str())
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}
}

#[async_trait]
impl SchemaInitializer for SqliteScheduleStore {
	#[instrument(skip(self, namespace), fields(namespace = %namespace))]
	async fn ensure_schema(&self, namespace: &NamespaceId) -> Result<()> {
		sqlx::query(
			r#"
			CREATE TABLE IF NOT EXISTS schedules (
				id INTEGER PRIMARY KEY AUTOINCREMENT,
				namespace TEXT NOT NULL,
				cron_expr TEXT NOT NULL,
				action TEXT NOT NULL,
				payload TEXT NOT NULL DEFAULT '{}',
				description TEXT NOT NULL DEFAULT '',
				is_enabled INTEGER NOT NULL DEFAULT 1,
				created_at TEXT NOT NULL,
				updated_at TEXT NOT NULL
			)
			"#,
		)
		.execute(&self.pool)
		.await?;

		sqlx::query(
			"CREATE INDEX IF NOT EXISTS idx_schedules_namespace_enabled ON schedules (namespace, is_enabled)",
		)
		.execute(&self.pool)
		.await?;

		Ok(())
	}
}

#[derive(sqlx::FromRow)]
struct ScheduleRow {
	id: i64,
	cron_expr: String,
	action: String,
	payload: String,
	description: String,
	is_enabled: bool,
	created_at: String,
	updated_at: String,
}

impl TryFrom<ScheduleRow> for Schedule {
	type Error = SchedulerError;

	fn try_from(row: ScheduleRow) -> Result<Self> {
		Ok(Schedule {
			id: row.id,
			cron_expr: row.cron_expr,
			action: row.action,
			payload: row.payload,
			description: row.description,
			is_enabled: row.is_enabled,
			created_at: parse_timestamp(&row.created_at, "created_at")?,
			updated_at: parse_timestamp(&row.updated_at, "updated_at")?,
		})
	}
}

fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|_| SchedulerError::Store(format!("invalid {column}: {value}")))
}
