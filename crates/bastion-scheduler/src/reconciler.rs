// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reconciliation of live timers against stored schedules.
//!
//! Each pass fetches a namespace's enabled schedules, keys them by
//! [`JobHash`], keeps timers whose hash is still wanted, registers timers for
//! new hashes and unregisters timers whose hash disappeared. A pass either
//! commits completely or leaves the previous timer set untouched.

use bastion_scheduler_core::actions::SCHEDULED_TASKS;
use bastion_scheduler_core::{JobHash, NamespaceId, Schedule, TriggeredMessage};
use futures::FutureExt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::engine::{TimerCallback, TimerEngine, TimerHandle};
use crate::error::{Result, SchedulerError};
use crate::namespace::NamespaceContext;
use crate::publisher::enqueue;
use crate::registry::JobRegistry;
use crate::spec::validate_timer_spec;

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
	pub fetched: usize,
	pub added: usize,
	pub retained: usize,
	pub removed: usize,
	pub duplicates: usize,
}

impl ReconcileReport {
	/// True when the pass changed nothing in the timer engine.
	pub fn is_noop(&self) -> bool {
		self.added == 0 && self.removed == 0
	}
}

struct PlannedJob<'a> {
	hash: JobHash,
	schedule: &'a Schedule,
	message: Vec<u8>,
}

/// Keeps each namespace's dynamic timers in sync with its schedule store.
pub struct Reconciler {
	engine: Arc<dyn TimerEngine>,
	registries: std::sync::Mutex<HashMap<NamespaceId, Arc<Mutex<JobRegistry>>>>,
	store_timeout: Duration,
	publish_timeout: Duration,
}

impl Reconciler {
	pub fn new(engine: Arc<dyn TimerEngine>, store_timeout: Duration, publish_timeout: Duration) -> Self {
		Self {
			engine,
			registries: std::sync::Mutex::new(HashMap::new()),
			store_timeout,
			publish_timeout,
		}
	}

	fn lock_registries(&self) -> std::sync::MutexGuard<'_, HashMap<NamespaceId, Arc<Mutex<JobRegistry>>>> {
		self.registries.lock().unwrap_or_else(|e| e.into_inner())
	}

	fn registry(&self, namespace: &NamespaceId) -> Arc<Mutex<JobRegistry>> {
		Arc::clone(self.lock_registries().entry(namespace.clone()).or_default())
	}

	/// Drop the registries of namespaces not in `active` and unregister their
	/// timers. Returns the number of timers removed.
	pub async fn prune(&self, active: &HashSet<NamespaceId>) -> usize {
		let departed: Vec<(NamespaceId, Arc<Mutex<JobRegistry>>)> = {
			let mut registries = self.lock_registries();
			let gone: Vec<NamespaceId> = registries.keys().filter(|ns| !active.contains(*ns)).cloned().collect();
			gone.into_iter()
				.filter_map(|ns| registries.remove(&ns).map(|registry| (ns, registry)))
				.collect()
		};

		let mut removed = 0;
		for (namespace, registry) in departed {
			let registry = registry.lock().await;
			for (_, handle) in registry.entries() {
				self.engine.remove(handle).await;
				removed += 1;
			}
			info!(%namespace, timers = registry.len(), "pruned registry of departed namespace");
		}
		removed
	}

	/// Current `(hash, handle)` entries of a namespace.
	pub async fn registry_entries(&self, namespace: &NamespaceId) -> Vec<(JobHash, TimerHandle)> {
		self.registry(namespace).lock().await.entries()
	}

	/// Run one reconciliation pass for a namespace.
	///
	/// Passes for the same namespace are serialized by the registry lock,
	/// which is held for the whole pass.
	#[instrument(skip(self, ctx), fields(namespace = %ctx.namespace))]
	pub async fn reconcile(&self, ctx: &NamespaceContext) -> Result<ReconcileReport> {
		let registry = self.registry(&ctx.namespace);
		let mut registry = registry.lock().await;

		let schedules = self.fetch(ctx).await?;
		let planned = plan(&schedules)?;

		let mut report = ReconcileReport {
			fetched: schedules.len(),
			..Default::default()
		};
		let mut new_hashes = Vec::with_capacity(planned.len());
		let mut new_handles: HashMap<JobHash, TimerHandle> = HashMap::with_capacity(planned.len());
		let mut added = Vec::new();

		for job in planned {
			if new_handles.contains_key(&job.hash) {
				debug!(job_hash = job.hash.short(), schedule_id = job.schedule.id, "duplicate schedule skipped");
				report.duplicates += 1;
				continue;
			}

			let handle = match registry.get(&job.hash) {
				Some(handle) => {
					report.retained += 1;
					handle
				}
				None => {
					let callback = scheduled_task_callback(ctx, job.schedule, job.message, self.publish_timeout);
					match self.engine.add(&job.schedule.cron_expr, callback).await {
						Ok(handle) => {
							info!(
								job_hash = job.hash.short(),
								schedule_id = job.schedule.id,
								action = %job.schedule.action,
								cron_expr = %job.schedule.cron_expr,
								description = %job.schedule.description,
								%handle,
								"registered scheduled task"
							);
							added.push(handle);
							handle
						}
						Err(e) => {
							self.roll_back(&added).await;
							return Err(e);
						}
					}
				}
			};

			new_hashes.push(job.hash.clone());
			new_handles.insert(job.hash, handle);
		}

		for old_hash in registry.hashes() {
			if new_handles.contains_key(old_hash) {
				continue;
			}
			if let Some(handle) = registry.get(old_hash) {
				self.engine.remove(handle).await;
				report.removed += 1;
				info!(job_hash = old_hash.short(), %handle, "unregistered scheduled task");
			}
		}

		report.added = added.len();
		registry.replace(new_hashes, new_handles);

		debug!(?report, "reconciliation pass complete");
		Ok(report)
	}

	async fn fetch(&self, ctx: &NamespaceContext) -> Result<Vec<Schedule>> {
		let fetch = ctx.store.list_enabled_schedules(&ctx.namespace);
		let schedules = match tokio::time::timeout(self.store_timeout, fetch).await {
			Ok(result) => result?,
			Err(_) => {
				return Err(SchedulerError::Timeout {
					operation: "schedule fetch",
					timeout: self.store_timeout,
				})
			}
		};
		Ok(schedules.into_iter().filter(|s| s.is_enabled).collect())
	}

	async fn roll_back(&self, added: &[TimerHandle]) {
		if !added.is_empty() {
			warn!(count = added.len(), "rolling back timers registered in failed pass");
		}
		for handle in added {
			self.engine.remove(*handle).await;
		}
	}
}

/// Validate and hash every fetched schedule before touching the engine.
fn plan(schedules: &[Schedule]) -> Result<Vec<PlannedJob<'_>>> {
	schedules
		.iter()
		.map(|schedule| {
			let payload = schedule.payload_object()?;
			let hash = JobHash::compute(&schedule.cron_expr, &schedule.action, &payload);
			validate_timer_spec(&schedule.cron_expr)?;
			let message = TriggeredMessage::new(schedule, payload).to_bytes()?;
			Ok(PlannedJob {
				hash,
				schedule,
				message,
			})
		})
		.collect()
}

fn scheduled_task_callback(
	ctx: &NamespaceContext,
	schedule: &Schedule,
	message: Vec<u8>,
	timeout: Duration,
) -> TimerCallback {
	let publisher = Arc::clone(&ctx.publisher);
	let namespace = ctx.namespace.clone();
	let label = format!("{} ({})", schedule.description, schedule.cron_expr);

	Arc::new(move || {
		let publisher = Arc::clone(&publisher);
		let namespace = namespace.clone();
		let label = label.clone();
		let message = message.clone();
		async move {
			let _ = enqueue(publisher.as_ref(), &namespace, SCHEDULED_TASKS, &label, message, timeout).await;
		}
		.boxed()
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::namespace::{for_each_namespace, StaticNamespaceDirectory};
	use crate::testing::{context, schedule, MemoryStore, RecordingEngine, RecordingPublisher, StalledStore};
	use bastion_scheduler_core::NAMESPACE_KEY;
	use serde_json::Value;

	const SECS: Duration = Duration::from_secs(5);

	struct Harness {
		engine: Arc<RecordingEngine>,
		store: Arc<MemoryStore>,
		publisher: Arc<RecordingPublisher>,
		reconciler: Reconciler,
	}

	impl Harness {
		fn new() -> Self {
			Self::with_engine(RecordingEngine::default())
		}

		fn with_engine(engine: RecordingEngine) -> Self {
			let engine = Arc::new(engine);
			Self {
				reconciler: Reconciler::new(engine.clone(), SECS, SECS),
				engine,
				store: Arc::new(MemoryStore::default()),
				publisher: Arc::new(RecordingPublisher::default()),
			}
		}

		fn ctx(&self, namespace: &str) -> NamespaceContext {
			context(namespace, self.store.clone(), self.publisher.clone())
		}
	}

	#[tokio::test]
	async fn test_single_schedule_fires_and_is_removed() {
		let h = Harness::new();
		let ns = NamespaceId::new("tenant-a");
		h.store.set(&ns, vec![schedule(1, "@every 30s", "scan", r#"{"x":"1"}"#)]);

		let report = h.reconciler.reconcile(&h.ctx("tenant-a")).await.unwrap();
		assert_eq!(report.added, 1);
		assert_eq!(h.reconciler.registry_entries(&ns).await.len(), 1);
		assert_eq!(h.engine.live_count(), 1);

		h.engine.fire_all().await;
		let tasks = h.publisher.tasks();
		assert_eq!(tasks.len(), 1);
		assert_eq!(tasks[0].topic, SCHEDULED_TASKS);
		assert_eq!(tasks[0].metadata.get(NAMESPACE_KEY).map(String::as_str), Some("tenant-a"));
		let body: Value = serde_json::from_slice(&tasks[0].payload).unwrap();
		assert_eq!(body["action"], "scan");
		assert_eq!(body["id"], 1);
		assert_eq!(body["payload"]["x"], "1");

		h.store.set(&ns, vec![]);
		let report = h.reconciler.reconcile(&h.ctx("tenant-a")).await.unwrap();
		assert_eq!(report.removed, 1);
		assert!(h.reconciler.registry_entries(&ns).await.is_empty());
		assert_eq!(h.engine.live_count(), 0);

		h.engine.fire_all().await;
		assert_eq!(h.publisher.tasks().len(), 1);
	}

	#[tokio::test]
	async fn test_identical_schedules_with_different_ids_dedup() {
		let h = Harness::new();
		let ns = NamespaceId::new("tenant-a");
		h.store.set(
			&ns,
			vec![
				schedule(1, "@every 30s", "scan", r#"{"x":"1"}"#),
				schedule(2, "@every 30s", "scan", r#"{"x":"1"}"#),
			],
		);

		let report = h.reconciler.reconcile(&h.ctx("tenant-a")).await.unwrap();
		assert_eq!(report.duplicates, 1);
		assert_eq!(h.reconciler.registry_entries(&ns).await.len(), 1);
		assert_eq!(h.engine.add_calls(), 1);
		assert_eq!(h.engine.live_count(), 1);
	}

	#[tokio::test]
	async fn test_second_pass_without_changes_is_noop() {
		let h = Harness::new();
		let ns = NamespaceId::new("tenant-a");
		h.store.set(
			&ns,
			vec![
				schedule(1, "@every 30s", "scan", "{}"),
				schedule(2, "0 0 */6 * * *", "sync", r#"{"registry":"r1"}"#),
			],
		);

		h.reconciler.reconcile(&h.ctx("tenant-a")).await.unwrap();
		let (adds, removes) = (h.engine.add_calls(), h.engine.remove_calls());

		let report = h.reconciler.reconcile(&h.ctx("tenant-a")).await.unwrap();
		assert!(report.is_noop());
		assert_eq!(report.retained, 2);
		assert_eq!(h.engine.add_calls(), adds);
		assert_eq!(h.engine.remove_calls(), removes);
	}

	#[tokio::test]
	async fn test_removal_compares_against_fresh_fetch() {
		let h = Harness::new();
		let ns = NamespaceId::new("tenant-a");
		h.store.set(
			&ns,
			vec![
				schedule(1, "@every 30s", "scan", "{}"),
				schedule(2, "@every 60s", "sync", "{}"),
			],
		);
		h.reconciler.reconcile(&h.ctx("tenant-a")).await.unwrap();
		let entries = h.reconciler.registry_entries(&ns).await;
		let dropped = entries[1].clone();

		// Schedule 2 disabled: its hash must leave both the registry and the engine,
		// even though the previous hash list still contains it.
		let mut disabled = schedule(2, "@every 60s", "sync", "{}");
		disabled.is_enabled = false;
		h.store.set(&ns, vec![schedule(1, "@every 30s", "scan", "{}"), disabled]);

		let report = h.reconciler.reconcile(&h.ctx("tenant-a")).await.unwrap();
		assert_eq!(report.removed, 1);
		assert!(!h.engine.is_live(dropped.1));

		let entries = h.reconciler.registry_entries(&ns).await;
		assert_eq!(entries.len(), 1);
		assert!(entries.iter().all(|(hash, _)| *hash != dropped.0));
	}

	#[tokio::test]
	async fn test_adding_schedule_preserves_existing_handles() {
		let h = Harness::new();
		let ns = NamespaceId::new("tenant-a");
		h.store.set(&ns, vec![schedule(1, "@every 30s", "scan", "{}")]);
		h.reconciler.reconcile(&h.ctx("tenant-a")).await.unwrap();
		let before = h.reconciler.registry_entries(&ns).await;

		h.store.set(
			&ns,
			vec![
				schedule(1, "@every 30s", "scan", "{}"),
				schedule(3, "@every 5m", "report", "{}"),
			],
		);
		let report = h.reconciler.reconcile(&h.ctx("tenant-a")).await.unwrap();
		assert_eq!(report.added, 1);
		assert_eq!(report.retained, 1);
		assert_eq!(report.removed, 0);

		let after = h.reconciler.registry_entries(&ns).await;
		assert_eq!(after.len(), 2);
		assert_eq!(after[0], before[0]);
	}

	#[tokio::test]
	async fn test_fetch_failure_leaves_timers_untouched() {
		let h = Harness::new();
		let ns = NamespaceId::new("tenant-a");
		h.store.set(&ns, vec![schedule(1, "@every 30s", "scan", "{}")]);
		h.reconciler.reconcile(&h.ctx("tenant-a")).await.unwrap();
		let before = h.reconciler.registry_entries(&ns).await;
		let (adds, removes) = (h.engine.add_calls(), h.engine.remove_calls());

		h.store.fail(&ns);
		let err = h.reconciler.reconcile(&h.ctx("tenant-a")).await.unwrap_err();
		assert!(matches!(err, SchedulerError::Store(_)));

		assert_eq!(h.reconciler.registry_entries(&ns).await, before);
		assert_eq!(h.engine.add_calls(), adds);
		assert_eq!(h.engine.remove_calls(), removes);
		assert_eq!(h.engine.live_count(), 1);
	}

	#[tokio::test]
	async fn test_invalid_cron_aborts_pass_without_mutation() {
		let h = Harness::new();
		let ns = NamespaceId::new("tenant-a");
		h.store.set(&ns, vec![schedule(1, "@every 30s", "scan", "{}")]);
		h.reconciler.reconcile(&h.ctx("tenant-a")).await.unwrap();
		let before = h.reconciler.registry_entries(&ns).await;

		h.store.set(
			&ns,
			vec![
				schedule(2, "@every 10m", "report", "{}"),
				schedule(3, "every tuesday", "sync", "{}"),
			],
		);
		let err = h.reconciler.reconcile(&h.ctx("tenant-a")).await.unwrap_err();
		assert!(err.is_validation());

		assert_eq!(h.reconciler.registry_entries(&ns).await, before);
		assert_eq!(h.engine.live_count(), 1);
		assert_eq!(h.engine.remove_calls(), 0);
	}

	#[tokio::test]
	async fn test_invalid_payload_aborts_pass() {
		let h = Harness::new();
		let ns = NamespaceId::new("tenant-a");
		h.store.set(&ns, vec![schedule(1, "@every 30s", "scan", "[\"not\", \"an object\"]")]);

		let err = h.reconciler.reconcile(&h.ctx("tenant-a")).await.unwrap_err();
		assert!(matches!(err, SchedulerError::Core(_)));
		assert_eq!(h.engine.add_calls(), 0);
		assert!(h.reconciler.registry_entries(&ns).await.is_empty());
	}

	#[tokio::test]
	async fn test_registration_failure_rolls_back_pass() {
		let h = Harness::with_engine(RecordingEngine::failing_on("@every 7m"));
		let ns = NamespaceId::new("tenant-a");
		h.store.set(&ns, vec![schedule(1, "@every 30s", "scan", "{}")]);
		h.reconciler.reconcile(&h.ctx("tenant-a")).await.unwrap();
		let before = h.reconciler.registry_entries(&ns).await;

		h.store.set(
			&ns,
			vec![
				schedule(2, "@every 10m", "report", "{}"),
				schedule(3, "@every 7m", "sync", "{}"),
			],
		);
		assert!(h.reconciler.reconcile(&h.ctx("tenant-a")).await.is_err());

		// The timer added for schedule 2 was rolled back; schedule 1 still runs.
		assert_eq!(h.reconciler.registry_entries(&ns).await, before);
		assert_eq!(h.engine.live_count(), 1);
		assert!(h.engine.is_live(before[0].1));
	}

	#[tokio::test]
	async fn test_namespaces_have_independent_registries() {
		let h = Harness::new();
		let a = NamespaceId::new("tenant-a");
		let b = NamespaceId::new("tenant-b");
		h.store.set(&a, vec![schedule(1, "@every 30s", "scan", "{}")]);
		h.store.set(&b, vec![schedule(1, "@every 30s", "scan", "{}")]);

		h.reconciler.reconcile(&h.ctx("tenant-a")).await.unwrap();
		h.reconciler.reconcile(&h.ctx("tenant-b")).await.unwrap();
		assert_eq!(h.engine.live_count(), 2);

		h.store.set(&a, vec![]);
		h.reconciler.reconcile(&h.ctx("tenant-a")).await.unwrap();
		assert!(h.reconciler.registry_entries(&a).await.is_empty());
		assert_eq!(h.reconciler.registry_entries(&b).await.len(), 1);
		assert_eq!(h.engine.live_count(), 1);

		h.engine.fire_all().await;
		let tasks = h.publisher.tasks();
		assert_eq!(tasks.len(), 1);
		assert_eq!(tasks[0].metadata.get(NAMESPACE_KEY).map(String::as_str), Some("tenant-b"));
	}

	#[tokio::test]
	async fn test_fetch_failure_in_one_namespace_does_not_affect_another() {
		let h = Harness::new();
		let a = NamespaceId::new("tenant-a");
		let b = NamespaceId::new("tenant-b");
		h.store.set(&a, vec![schedule(1, "@every 30s", "scan", "{}")]);
		h.reconciler.reconcile(&h.ctx("tenant-a")).await.unwrap();
		let a_before = h.reconciler.registry_entries(&a).await;

		h.store.fail(&a);
		h.store.set(&b, vec![schedule(5, "@every 2m", "sync", "{}")]);

		let directory = StaticNamespaceDirectory::new(vec![a.clone(), b.clone()], h.store.clone(), h.publisher.clone());
		let summary = for_each_namespace(&directory, "reconcile", |ctx| {
			let reconciler = &h.reconciler;
			async move { reconciler.reconcile(&ctx).await.map(|_| ()) }
		})
		.await
		.unwrap();

		assert_eq!(summary.failed.len(), 1);
		assert_eq!(summary.failed[0].0, a);
		assert_eq!(summary.succeeded, vec![b.clone()]);
		assert_eq!(h.reconciler.registry_entries(&a).await, a_before);
		assert_eq!(h.reconciler.registry_entries(&b).await.len(), 1);
	}

	#[tokio::test]
	async fn test_publish_failure_does_not_touch_registry() {
		let h = Harness::new();
		let ns = NamespaceId::new("tenant-a");
		h.store.set(&ns, vec![schedule(1, "@every 30s", "scan", "{}")]);
		h.reconciler.reconcile(&h.ctx("tenant-a")).await.unwrap();
		let before = h.reconciler.registry_entries(&ns).await;

		h.publisher.set_failing(true);
		h.engine.fire_all().await;
		assert!(h.publisher.tasks().is_empty());
		assert_eq!(h.reconciler.registry_entries(&ns).await, before);

		h.publisher.set_failing(false);
		h.engine.fire_all().await;
		assert_eq!(h.publisher.tasks().len(), 1);
	}

	#[tokio::test]
	async fn test_unix_weekday_schedules_register() {
		let h = Harness::new();
		let ns = NamespaceId::new("tenant-a");
		h.store.set(
			&ns,
			vec![
				schedule(1, "0 9 * * 0", "weekly_report", "{}"),
				schedule(2, "0 0 9 * * 1-5", "scan", "{}"),
				schedule(3, "@midnight", "clean_up", "{}"),
			],
		);

		let report = h.reconciler.reconcile(&h.ctx("tenant-a")).await.unwrap();
		assert_eq!(report.added, 3);
		assert_eq!(h.engine.live_count(), 3);
	}

	#[tokio::test]
	async fn test_prune_drops_departed_namespaces() {
		let h = Harness::new();
		let a = NamespaceId::new("tenant-a");
		let b = NamespaceId::new("tenant-b");
		h.store.set(&a, vec![schedule(1, "@every 30s", "scan", "{}"), schedule(2, "@every 1m", "sync", "{}")]);
		h.store.set(&b, vec![schedule(1, "@every 30s", "scan", "{}")]);
		h.reconciler.reconcile(&h.ctx("tenant-a")).await.unwrap();
		h.reconciler.reconcile(&h.ctx("tenant-b")).await.unwrap();
		assert_eq!(h.engine.live_count(), 3);

		let removed = h.reconciler.prune(&HashSet::from([b.clone()])).await;
		assert_eq!(removed, 2);
		assert_eq!(h.engine.live_count(), 1);
		assert_eq!(h.reconciler.registry_entries(&b).await.len(), 1);

		// A returning namespace starts from an empty registry.
		let report = h.reconciler.reconcile(&h.ctx("tenant-a")).await.unwrap();
		assert_eq!(report.added, 2);
		assert_eq!(h.engine.live_count(), 3);
	}

	#[tokio::test(start_paused = true)]
	async fn test_stalled_fetch_times_out() {
		let engine = Arc::new(RecordingEngine::default());
		let reconciler = Reconciler::new(engine.clone(), Duration::from_secs(30), SECS);
		let publisher = Arc::new(RecordingPublisher::default());
		let ctx = NamespaceContext {
			namespace: NamespaceId::new("tenant-a"),
			store: Arc::new(StalledStore),
			publisher: publisher.clone(),
			initializer: Arc::new(MemoryStore::default()),
		};

		let err = reconciler.reconcile(&ctx).await.unwrap_err();
		assert!(matches!(err, SchedulerError::Timeout { operation: "schedule fetch", .. }));
		assert_eq!(engine.add_calls(), 0);
	}
}
