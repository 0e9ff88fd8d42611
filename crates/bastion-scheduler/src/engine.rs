// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cron timer engine.
//!
//! [`CronTimerEngine`] adapts `tokio-cron-scheduler` to the [`TimerEngine`]
//! seam. Timers are added and removed by opaque [`TimerHandle`], which is the
//! job id the scheduler assigns. Every fire is tracked so shutdown can wait
//! for the ones already running.

use async_trait::async_trait;
use chrono_tz::Tz;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::spec::TimerSpec;

/// Callback invoked each time a timer fires.
pub type TimerCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Opaque handle of a registered timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub Uuid);

impl TimerHandle {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for TimerHandle {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for TimerHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Timer multiplexer used by the scheduler.
#[async_trait]
pub trait TimerEngine: Send + Sync {
	/// Register `callback` under `spec`. A malformed spec fails immediately and
	/// registers nothing.
	async fn add(&self, spec: &str, callback: TimerCallback) -> Result<TimerHandle>;

	/// Unregister a timer. Returns `false` for an unknown handle.
	async fn remove(&self, handle: TimerHandle) -> bool;

	/// Begin firing registered timers.
	async fn start(&self) -> Result<()>;

	/// Stop firing and wait for in-flight callbacks.
	async fn shutdown(&self);
}

/// [`TimerEngine`] backed by a [`JobScheduler`], evaluating cron schedules in
/// a fixed time zone.
pub struct CronTimerEngine {
	scheduler: JobScheduler,
	timezone: Tz,
	tracker: TaskTracker,
	handles: Mutex<HashSet<TimerHandle>>,
	running: AtomicBool,
	stopped: AtomicBool,
}

impl CronTimerEngine {
	pub async fn new(timezone: Tz) -> Result<Self> {
		let scheduler = JobScheduler::new().await?;
		Ok(Self {
			scheduler,
			timezone,
			tracker: TaskTracker::new(),
			handles: Mutex::new(HashSet::new()),
			running: AtomicBool::new(false),
			stopped: AtomicBool::new(false),
		})
	}

	pub async fn utc() -> Result<Self> {
		Self::new(Tz::UTC).await
	}

	/// Number of registered timers.
	pub fn len(&self) -> usize {
		self.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn contains(&self, handle: TimerHandle) -> bool {
		self.lock().contains(&handle)
	}

	fn lock(&self) -> MutexGuard<'_, HashSet<TimerHandle>> {
		self.handles.lock().unwrap_or_else(|e| e.into_inner())
	}

	fn job(&self, spec: &TimerSpec, callback: TimerCallback) -> std::result::Result<Job, JobSchedulerError> {
		let tracker = self.tracker.clone();
		let run = move |_id: Uuid, _scheduler: JobScheduler| -> BoxFuture<'static, ()> {
			tracker.track_future(callback()).boxed()
		};

		match spec {
			TimerSpec::Every(period) => Job::new_repeated_async(*period, run),
			TimerSpec::Cron { expression, .. } => Job::new_async_tz(expression.as_str(), self.timezone, run),
		}
	}
}

#[async_trait]
impl TimerEngine for CronTimerEngine {
	async fn add(&self, spec: &str, callback: TimerCallback) -> Result<TimerHandle> {
		let parsed = TimerSpec::parse(spec)?;
		let job = self.job(&parsed, callback)?;
		let handle = TimerHandle(self.scheduler.add(job).await?);
		self.lock().insert(handle);

		debug!(%handle, spec, "timer added");
		Ok(handle)
	}

	async fn remove(&self, handle: TimerHandle) -> bool {
		let known = self.lock().remove(&handle);
		if !known {
			return false;
		}
		if let Err(e) = self.scheduler.remove(&handle.0).await {
			warn!(%handle, error = ?e, "timer removal failed");
		}
		debug!(%handle, "timer removed");
		true
	}

	async fn start(&self) -> Result<()> {
		if self.stopped.load(Ordering::SeqCst) || self.running.swap(true, Ordering::SeqCst) {
			return Ok(());
		}
		if let Err(e) = self.scheduler.start().await {
			self.running.store(false, Ordering::SeqCst);
			return Err(e.into());
		}

		info!(timers = self.len(), timezone = %self.timezone, "timer engine started");
		Ok(())
	}

	#[instrument(skip(self))]
	async fn shutdown(&self) {
		if self.stopped.swap(true, Ordering::SeqCst) {
			return;
		}
		self.running.store(false, Ordering::SeqCst);

		// Dropping the jobs releases their callbacks.
		let handles: Vec<TimerHandle> = self.lock().drain().collect();
		for handle in handles {
			if let Err(e) = self.scheduler.remove(&handle.0).await {
				warn!(%handle, error = ?e, "timer removal failed");
			}
		}

		let mut scheduler = self.scheduler.clone();
		if let Err(e) = scheduler.shutdown().await {
			warn!(error = ?e, "timer scheduler shutdown failed");
		}

		self.tracker.close();
		self.tracker.wait().await;

		info!("timer engine shut down");
	}
}
