// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Schedule store interfaces.

use async_trait::async_trait;
use bastion_scheduler_core::{NamespaceId, Schedule};

use crate::error::Result;

/// Durable store of operator-defined schedules. Read-only to the scheduler.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
	/// All enabled schedules of a namespace.
	async fn list_enabled_schedules(&self, namespace: &NamespaceId) -> Result<Vec<Schedule>>;
}

/// One-time per-namespace initialization run before the store is first used.
#[async_trait]
pub trait SchemaInitializer: Send + Sync {
	async fn ensure_schema(&self, namespace: &NamespaceId) -> Result<()>;
}
