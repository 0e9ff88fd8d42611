// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for scheduler operations.

use bastion_scheduler_core::SchedulerCoreError;
use std::time::Duration;
use thiserror::Error;
use tokio_cron_scheduler::JobSchedulerError;

/// Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Errors that can occur in scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
	#[error("invalid timer spec '{spec}': {message}")]
	InvalidTimerSpec { spec: String, message: String },

	#[error(transparent)]
	Core(#[from] SchedulerCoreError),

	#[error("schedule store error: {0}")]
	Store(String),

	#[error("timer engine error: {0}")]
	Engine(String),

	#[error("publish failed: {0}")]
	Publish(String),

	#[error("{operation} timed out after {}s", timeout.as_secs())]
	Timeout {
		operation: &'static str,
		timeout: Duration,
	},

	#[error("failed to register static task {action}: {source}")]
	StaticRegistration {
		action: String,
		#[source]
		source: Box<SchedulerError>,
	},

	#[error("{} bootstrap step(s) failed: {}", failures.len(), failures.join("; "))]
	Bootstrap { failures: Vec<String> },

	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),

	#[error("internal error: {0}")]
	Internal(String),
}

impl SchedulerError {
	/// Validation errors come from bad schedule data rather than a failing
	/// collaborator.
	pub fn is_validation(&self) -> bool {
		matches!(
			self,
			SchedulerError::InvalidTimerSpec { .. } | SchedulerError::Core(_)
		)
	}
}

impl From<JobSchedulerError> for SchedulerError {
	fn from(e: JobSchedulerError) -> Self {
		SchedulerError::Engine(format!("{e:?}"))
	}
}
