// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Installation of the built-in periodic tasks.

use bastion_scheduler_core::timestamp_body;
use chrono::Utc;
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument};

use crate::catalog::StaticTask;
use crate::engine::{TimerCallback, TimerEngine, TimerHandle};
use crate::error::{Result, SchedulerError};
use crate::namespace::NamespaceContext;
use crate::publisher::enqueue;

/// Registers a static catalog with the timer engine. The resulting timers are
/// never reconciled or removed.
pub struct StaticTaskRegistrar {
	engine: Arc<dyn TimerEngine>,
	publish_timeout: Duration,
}

impl StaticTaskRegistrar {
	pub fn new(engine: Arc<dyn TimerEngine>, publish_timeout: Duration) -> Self {
		Self {
			engine,
			publish_timeout,
		}
	}

	/// Install every task of `catalog` for one namespace.
	///
	/// On the first failure the timers already installed by this call are
	/// removed and [`SchedulerError::StaticRegistration`] is returned.
	#[instrument(skip(self, ctx, catalog), fields(namespace = %ctx.namespace))]
	pub async fn register(&self, ctx: &NamespaceContext, catalog: &[StaticTask]) -> Result<Vec<TimerHandle>> {
		let mut handles = Vec::with_capacity(catalog.len());

		for task in catalog {
			match self.engine.add(task.spec, self.callback(ctx, task)).await {
				Ok(handle) => {
					info!(action = task.action, spec = task.spec, %handle, "registered static task");
					handles.push(handle);
				}
				Err(e) => {
					error!(action = task.action, spec = task.spec, error = %e, "static task registration failed");
					for handle in handles {
						self.engine.remove(handle).await;
					}
					return Err(SchedulerError::StaticRegistration {
						action: task.action.to_string(),
						source: Box::new(e),
					});
				}
			}
		}

		Ok(handles)
	}

	fn callback(&self, ctx: &NamespaceContext, task: &StaticTask) -> TimerCallback {
		let publisher = Arc::clone(&ctx.publisher);
		let namespace = ctx.namespace.clone();
		let action = task.action;
		let timeout = self.publish_timeout;

		Arc::new(move || {
			let publisher = Arc::clone(&publisher);
			let namespace = namespace.clone();
			async move {
				let body = timestamp_body(Utc::now());
				let _ = enqueue(publisher.as_ref(), &namespace, action, action, body, timeout).await;
			}
			.boxed()
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::catalog::STATIC_TASKS;
	use crate::testing::{context, MemoryStore, RecordingEngine, RecordingPublisher};
	use bastion_scheduler_core::NAMESPACE_KEY;

	fn setup(engine: RecordingEngine) -> (Arc<RecordingEngine>, Arc<RecordingPublisher>, StaticTaskRegistrar, NamespaceContext) {
		let engine = Arc::new(engine);
		let publisher = Arc::new(RecordingPublisher::default());
		let registrar = StaticTaskRegistrar::new(engine.clone(), Duration::from_secs(5));
		let ctx = context("tenant-a", Arc::new(MemoryStore::default()), publisher.clone());
		(engine, publisher, registrar, ctx)
	}

	#[tokio::test]
	async fn test_registers_full_catalog() {
		let (engine, _, registrar, ctx) = setup(RecordingEngine::default());

		let handles = registrar.register(&ctx, STATIC_TASKS).await.unwrap();
		assert_eq!(handles.len(), STATIC_TASKS.len());
		assert_eq!(engine.live_count(), STATIC_TASKS.len());

		let specs: Vec<_> = STATIC_TASKS.iter().map(|t| t.spec.to_string()).collect();
		assert_eq!(engine.specs(), specs);
	}

	#[tokio::test]
	async fn test_fire_publishes_timestamp_on_action_topic() {
		let (engine, publisher, registrar, ctx) = setup(RecordingEngine::default());
		let catalog = [StaticTask::new("@every 30s", "link_nodes")];
		registrar.register(&ctx, &catalog).await.unwrap();

		engine.fire_all().await;
		let tasks = publisher.tasks();
		assert_eq!(tasks.len(), 1);
		assert_eq!(tasks[0].topic, "link_nodes");
		assert_eq!(tasks[0].metadata.get(NAMESPACE_KEY).map(String::as_str), Some("tenant-a"));

		let millis: i64 = std::str::from_utf8(&tasks[0].payload).unwrap().parse().unwrap();
		assert!(millis > 0);
	}

	#[tokio::test]
	async fn test_bad_entry_fails_and_unwinds() {
		let (engine, _, registrar, ctx) = setup(RecordingEngine::default());
		let catalog = [
			StaticTask::new("@every 30s", "link_nodes"),
			StaticTask::new("@every 5m", "clean_up_postgresql"),
			StaticTask::new("@every thirty seconds", "broken"),
		];

		let err = registrar.register(&ctx, &catalog).await.unwrap_err();
		match err {
			SchedulerError::StaticRegistration { action, source } => {
				assert_eq!(action, "broken");
				assert!(source.is_validation());
			}
			other => panic!("unexpected error: {other}"),
		}
		assert_eq!(engine.live_count(), 0);
	}
}
