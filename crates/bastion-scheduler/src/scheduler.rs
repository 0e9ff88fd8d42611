// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Scheduler lifecycle: startup wiring, the reconciliation loop and shutdown.

use async_trait::async_trait;
use bastion_scheduler_core::NamespaceId;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, instrument, warn};

use crate::bootstrap::BootstrapRunner;
use crate::catalog::{StaticTask, BOOTSTRAP_TASKS, STATIC_TASKS};
use crate::engine::{TimerEngine, TimerHandle};
use crate::error::{Result, SchedulerError};
use crate::namespace::{for_each_namespace, NamespaceContext, NamespaceDirectory, NamespaceRunSummary};
use crate::reconciler::Reconciler;
use crate::registrar::StaticTaskRegistrar;

const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 15 * 60;
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PUBLISH_TIMEOUT_SECS: u64 = 10;

/// Longest reconcile interval the loop honours.
const MAX_RECONCILE_INTERVAL: Duration = Duration::from_secs(30 * 24 * 3600);

/// Timing knobs of a [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
	pub reconcile_interval: Duration,
	pub store_timeout: Duration,
	pub publish_timeout: Duration,
}

impl Default for SchedulerSettings {
	fn default() -> Self {
		Self {
			reconcile_interval: Duration::from_secs(DEFAULT_RECONCILE_INTERVAL_SECS),
			store_timeout: Duration::from_secs(DEFAULT_STORE_TIMEOUT_SECS),
			publish_timeout: Duration::from_secs(DEFAULT_PUBLISH_TIMEOUT_SECS),
		}
	}
}

/// Per-namespace outcomes of [`Scheduler::init`].
#[derive(Debug, Default)]
pub struct InitReport {
	pub registration: NamespaceRunSummary,
	pub bootstrap: NamespaceRunSummary,
	pub initial_reconcile: NamespaceRunSummary,
}

/// Owns the timer engine and drives static registration, bootstrap and
/// periodic reconciliation for every namespace.
pub struct Scheduler {
	engine: Arc<dyn TimerEngine>,
	reconciler: Arc<Reconciler>,
	registrar: StaticTaskRegistrar,
	bootstrap: BootstrapRunner,
	static_tasks: &'static [StaticTask],
	bootstrap_tasks: &'static [&'static str],
	settings: SchedulerSettings,
	initialized: AtomicBool,
	shutdown_tx: broadcast::Sender<()>,
	handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
	pub fn new(engine: Arc<dyn TimerEngine>, settings: SchedulerSettings) -> Self {
		let (shutdown_tx, _) = broadcast::channel(1);
		Self {
			reconciler: Arc::new(Reconciler::new(
				Arc::clone(&engine),
				settings.store_timeout,
				settings.publish_timeout,
			)),
			registrar: StaticTaskRegistrar::new(Arc::clone(&engine), settings.publish_timeout),
			bootstrap: BootstrapRunner::new(settings.publish_timeout),
			engine,
			static_tasks: STATIC_TASKS,
			bootstrap_tasks: BOOTSTRAP_TASKS,
			settings,
			initialized: AtomicBool::new(false),
			shutdown_tx,
			handles: Mutex::new(Vec::new()),
		}
	}

	/// Replace the built-in catalogs.
	pub fn with_catalog(mut self, static_tasks: &'static [StaticTask], bootstrap_tasks: &'static [&'static str]) -> Self {
		self.static_tasks = static_tasks;
		self.bootstrap_tasks = bootstrap_tasks;
		self
	}

	pub fn reconciler(&self) -> &Reconciler {
		&self.reconciler
	}

	/// Start scheduling for every namespace of `directory`.
	///
	/// Runs static registration, then bootstrap, starts the engine, performs
	/// an initial reconciliation pass and finally spawns the periodic loop.
	/// A namespace whose static registration failed is excluded from all
	/// later steps. Per-namespace failures are reported, never returned.
	///
	/// If namespace enumeration fails, the static timers installed so far are
	/// removed and `init` may be called again.
	#[instrument(skip_all)]
	pub async fn init(&self, directory: Arc<dyn NamespaceDirectory>) -> Result<InitReport> {
		if self.initialized.swap(true, Ordering::SeqCst) {
			return Err(SchedulerError::Internal("scheduler already initialized".to_string()));
		}

		let installed = std::sync::Mutex::new(Vec::new());
		let result = self.start_up(directory, &installed).await;
		if let Err(e) = &result {
			let handles: Vec<TimerHandle> = std::mem::take(&mut *installed.lock().unwrap_or_else(|e| e.into_inner()));
			warn!(error = %e, timers = handles.len(), "scheduler init failed, removing static timers");
			for handle in handles {
				self.engine.remove(handle).await;
			}
			self.initialized.store(false, Ordering::SeqCst);
		}
		result
	}

	async fn start_up(
		&self,
		directory: Arc<dyn NamespaceDirectory>,
		installed: &std::sync::Mutex<Vec<TimerHandle>>,
	) -> Result<InitReport> {
		let registration = for_each_namespace(directory.as_ref(), "static task registration", |ctx| {
			let registrar = &self.registrar;
			let tasks = self.static_tasks;
			async move {
				let handles = registrar.register(&ctx, tasks).await?;
				installed.lock().unwrap_or_else(|e| e.into_inner()).extend(handles);
				Ok::<(), SchedulerError>(())
			}
		})
		.await?;

		let excluded: HashSet<NamespaceId> = registration.failed.iter().map(|(ns, _)| ns.clone()).collect();
		if !excluded.is_empty() {
			warn!(count = excluded.len(), "namespaces excluded after static registration failure");
		}
		let directory: Arc<dyn NamespaceDirectory> = Arc::new(ActiveNamespaces {
			inner: directory,
			excluded,
		});

		let bootstrap = for_each_namespace(directory.as_ref(), "bootstrap", |ctx| {
			let runner = &self.bootstrap;
			let tasks = self.bootstrap_tasks;
			async move { runner.run(&ctx, tasks).await }
		})
		.await?;

		self.engine.start().await?;

		let initial_reconcile = reconcile_pass(&self.reconciler, directory.as_ref()).await?;

		let handle = tokio::spawn(reconcile_loop(
			Arc::clone(&self.reconciler),
			directory,
			self.settings.reconcile_interval,
			self.shutdown_tx.subscribe(),
		));
		self.handles.lock().await.push(handle);

		info!(
			interval_secs = self.settings.reconcile_interval.as_secs(),
			"scheduler started"
		);
		Ok(InitReport {
			registration,
			bootstrap,
			initial_reconcile,
		})
	}

	/// Run one reconciliation pass over every namespace of `directory`.
	pub async fn reconcile_all(&self, directory: &dyn NamespaceDirectory) -> Result<NamespaceRunSummary> {
		reconcile_pass(&self.reconciler, directory).await
	}

	/// Stop the reconciliation loop, then stop the engine and wait for
	/// in-flight fires.
	#[instrument(skip(self))]
	pub async fn shutdown(&self) {
		let _ = self.shutdown_tx.send(());

		let mut handles = self.handles.lock().await;
		for handle in handles.drain(..) {
			let _ = handle.await;
		}

		self.engine.shutdown().await;
		info!("scheduler shut down");
	}
}

/// Namespaces of `inner` minus those that failed startup.
struct ActiveNamespaces {
	inner: Arc<dyn NamespaceDirectory>,
	excluded: HashSet<NamespaceId>,
}

#[async_trait]
impl NamespaceDirectory for ActiveNamespaces {
	async fn namespaces(&self) -> Result<Vec<NamespaceContext>> {
		Ok(self
			.inner
			.namespaces()
			.await?
			.into_iter()
			.filter(|ctx| !self.excluded.contains(&ctx.namespace))
			.collect())
	}
}

/// Reconcile every namespace, then drop registries of namespaces that left
/// the directory.
async fn reconcile_pass(reconciler: &Reconciler, directory: &dyn NamespaceDirectory) -> Result<NamespaceRunSummary> {
	let summary =
		for_each_namespace(directory, "reconcile", |ctx| async move { reconciler.reconcile(&ctx).await.map(|_| ()) })
			.await?;

	let present: HashSet<NamespaceId> = summary
		.succeeded
		.iter()
		.chain(summary.failed.iter().map(|(namespace, _)| namespace))
		.cloned()
		.collect();
	let pruned = reconciler.prune(&present).await;
	if pruned > 0 {
		info!(timers = pruned, "removed timers of departed namespaces");
	}

	Ok(summary)
}

async fn reconcile_loop(
	reconciler: Arc<Reconciler>,
	directory: Arc<dyn NamespaceDirectory>,
	interval: Duration,
	mut shutdown_rx: broadcast::Receiver<()>,
) {
	let period = interval.min(MAX_RECONCILE_INTERVAL);
	if period < interval {
		warn!(
			interval_secs = interval.as_secs(),
			capped_secs = period.as_secs(),
			"reconcile interval too large, capping"
		);
	}
	let now = Instant::now();
	let first = now.checked_add(period).unwrap_or_else(|| {
		warn!("reconcile interval overflows the clock, reconciling immediately");
		now
	});
	let mut ticker = tokio::time::interval_at(first, period);
	ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

	loop {
		tokio::select! {
			biased;
			_ = shutdown_rx.recv() => {
				info!("stopping reconciliation loop");
				break;
			}
			_ = ticker.tick() => {
				match reconcile_pass(&reconciler, directory.as_ref()).await {
					Ok(summary) if !summary.all_succeeded() => {
						warn!(failed = summary.failed.len(), "reconciliation pass had failures");
					}
					Ok(_) => {}
					Err(e) => warn!(error = %e, "could not enumerate namespaces"),
				}
			}
		}
	}
}
