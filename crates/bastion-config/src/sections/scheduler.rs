// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Scheduler timing configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 900;
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PUBLISH_TIMEOUT_SECS: u64 = 10;
const DEFAULT_TIMEZONE: &str = "UTC";
const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SchedulerConfigLayer {
	#[serde(default)]
	pub reconcile_interval_secs: Option<u64>,
	#[serde(default)]
	pub store_timeout_secs: Option<u64>,
	#[serde(default)]
	pub publish_timeout_secs: Option<u64>,
	#[serde(default)]
	pub timezone: Option<String>,
	#[serde(default)]
	pub queue_capacity: Option<usize>,
}

impl SchedulerConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.reconcile_interval_secs.is_some() {
			self.reconcile_interval_secs = other.reconcile_interval_secs;
		}
		if other.store_timeout_secs.is_some() {
			self.store_timeout_secs = other.store_timeout_secs;
		}
		if other.publish_timeout_secs.is_some() {
			self.publish_timeout_secs = other.publish_timeout_secs;
		}
		if other.timezone.is_some() {
			self.timezone = other.timezone;
		}
		if other.queue_capacity.is_some() {
			self.queue_capacity = other.queue_capacity;
		}
	}

	pub fn finalize(self) -> SchedulerConfig {
		SchedulerConfig {
			reconcile_interval_secs: self.reconcile_interval_secs.unwrap_or(DEFAULT_RECONCILE_INTERVAL_SECS),
			store_timeout_secs: self.store_timeout_secs.unwrap_or(DEFAULT_STORE_TIMEOUT_SECS),
			publish_timeout_secs: self.publish_timeout_secs.unwrap_or(DEFAULT_PUBLISH_TIMEOUT_SECS),
			timezone: self.timezone.unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
			queue_capacity: self.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
	pub reconcile_interval_secs: u64,
	pub store_timeout_secs: u64,
	pub publish_timeout_secs: u64,
	/// IANA zone name cron expressions are evaluated in.
	pub timezone: String,
	pub queue_capacity: usize,
}

impl SchedulerConfig {
	pub fn reconcile_interval(&self) -> Duration {
		Duration::from_secs(self.reconcile_interval_secs)
	}

	pub fn store_timeout(&self) -> Duration {
		Duration::from_secs(self.store_timeout_secs)
	}

	pub fn publish_timeout(&self) -> Duration {
		Duration::from_secs(self.publish_timeout_secs)
	}
}

impl Default for SchedulerConfig {
	fn default() -> Self {
		SchedulerConfigLayer::default().finalize()
	}
}
