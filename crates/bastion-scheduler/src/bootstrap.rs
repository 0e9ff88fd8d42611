// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! One-shot startup tasks.

use bastion_scheduler_core::timestamp_body;
use chrono::Utc;
use std::time::Duration;
use tracing::{error, info, instrument};

use crate::error::{Result, SchedulerError};
use crate::namespace::NamespaceContext;
use crate::publisher::enqueue;

/// Ensures a namespace's schema, then publishes each bootstrap action once.
///
/// Every step is attempted; failures are collected into
/// [`SchedulerError::Bootstrap`].
pub struct BootstrapRunner {
	publish_timeout: Duration,
}

impl BootstrapRunner {
	pub fn new(publish_timeout: Duration) -> Self {
		Self { publish_timeout }
	}

	#[instrument(skip(self, ctx, tasks), fields(namespace = %ctx.namespace))]
	pub async fn run(&self, ctx: &NamespaceContext, tasks: &[&str]) -> Result<()> {
		let mut failures = Vec::new();

		if let Err(e) = ctx.initializer.ensure_schema(&ctx.namespace).await {
			error!(error = %e, "schema initialization failed");
			failures.push(format!("ensure schema: {e}"));
		}

		for action in tasks {
			let body = timestamp_body(Utc::now());
			if let Err(e) = enqueue(ctx.publisher.as_ref(), &ctx.namespace, action, action, body, self.publish_timeout).await {
				failures.push(format!("{action}: {e}"));
			}
		}

		if failures.is_empty() {
			info!(tasks = tasks.len(), "bootstrap complete");
			Ok(())
		} else {
			Err(SchedulerError::Bootstrap { failures })
		}
	}
}
