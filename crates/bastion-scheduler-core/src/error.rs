// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for scheduler core types.

use thiserror::Error;

/// Result type for scheduler core operations.
pub type Result<T> = std::result::Result<T, SchedulerCoreError>;

/// Errors that can occur while interpreting schedule data.
#[derive(Debug, Error)]
pub enum SchedulerCoreError {
	#[error("invalid payload for schedule {id}: {message}")]
	InvalidPayload { id: i64, message: String },

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}
