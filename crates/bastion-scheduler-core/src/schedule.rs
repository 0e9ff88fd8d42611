// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Operator-defined recurring schedules and their dedup hash.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{Result, SchedulerCoreError};

/// A recurring schedule persisted by the schedule store.
///
/// The scheduler only reads these. `payload` is kept as the JSON text the
/// store holds so task kinds the scheduler does not know about pass through
/// untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
	pub id: i64,
	/// Timer spec: cron expression (second resolution) or `@every <duration>`.
	pub cron_expr: String,
	pub action: String,
	/// JSON object text, namespace specific.
	pub payload: String,
	pub description: String,
	pub is_enabled: bool,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Schedule {
	/// Parse the payload into a JSON object.
	///
	/// An empty payload is treated as `{}`. Anything other than an object is
	/// rejected.
	pub fn payload_object(&self) -> Result<Map<String, Value>> {
		let text = self.payload.trim();
		if text.is_empty() {
			return Ok(Map::new());
		}

		let value: Value =
			serde_json::from_str(text).map_err(|e| SchedulerCoreError::InvalidPayload {
				id: self.id,
				message: e.to_string(),
			})?;

		match value {
			Value::Object(map) => Ok(map),
			other => Err(SchedulerCoreError::InvalidPayload {
				id: self.id,
				message: format!("expected a JSON object, got {}", json_kind(&other)),
			}),
		}
	}

	/// Compute the dedup hash of this schedule.
	///
	/// Only the cron expression, the action and the payload contribute. The
	/// row id, description and timestamps are ignored so two rows with the
	/// same scheduling semantics share a hash.
	pub fn job_hash(&self) -> Result<JobHash> {
		let payload = self.payload_object()?;
		Ok(JobHash::compute(&self.cron_expr, &self.action, &payload))
	}
}

fn json_kind(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "a boolean",
		Value::Number(_) => "a number",
		Value::String(_) => "a string",
		Value::Array(_) => "an array",
		Value::Object(_) => "an object",
	}
}

/// Deterministic digest of a schedule's semantic fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHash(String);

impl JobHash {
	pub fn compute(cron_expr: &str, action: &str, payload: &Map<String, Value>) -> Self {
		// serde_json maps are ordered by key, so this is canonical.
		let canonical = Value::Object(payload.clone()).to_string();

		let mut hasher = Sha256::new();
		hasher.update(cron_expr.as_bytes());
		hasher.update([0u8]);
		hasher.update(action.as_bytes());
		hasher.update([0u8]);
		hasher.update(canonical.as_bytes());
		Self(hex::encode(hasher.finalize()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// First 12 hex characters, for log lines.
	pub fn short(&self) -> &str {
		&self.0[..12.min(self.0.len())]
	}
}

impl fmt::Display for JobHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}
