// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Messages handed to the task publisher when a timer fires.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::Result;
use crate::schedule::Schedule;

/// Message metadata. Always carries the namespace tag.
pub type Metadata = HashMap<String, String>;

/// Envelope published on the scheduled-tasks topic for a stored schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggeredMessage {
	pub action: String,
	pub id: i64,
	pub payload: Map<String, Value>,
	pub description: String,
}

impl TriggeredMessage {
	pub fn new(schedule: &Schedule, payload: Map<String, Value>) -> Self {
		Self {
			action: schedule.action.clone(),
			id: schedule.id,
			payload,
			description: schedule.description.clone(),
		}
	}

	pub fn to_bytes(&self) -> Result<Vec<u8>> {
		Ok(serde_json::to_vec(self)?)
	}
}

/// Body of a built-in task message: Unix time in milliseconds, as text.
pub fn timestamp_body(now: DateTime<Utc>) -> Vec<u8> {
	now.timestamp_millis().to_string().into_bytes()
}
