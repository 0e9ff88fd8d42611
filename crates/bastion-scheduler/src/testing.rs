// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory fakes shared by the unit tests.

use async_trait::async_trait;
use bastion_scheduler_core::{Metadata, NamespaceId, Schedule};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::engine::{TimerCallback, TimerEngine, TimerHandle};
use crate::error::{Result, SchedulerError};
use crate::namespace::NamespaceContext;
use crate::publisher::{PublishedTask, TaskPublisher};
use crate::spec::TimerSpec;
use crate::store::{ScheduleStore, SchemaInitializer};

pub(crate) fn schedule(id: i64, cron_expr: &str, action: &str, payload: &str) -> Schedule {
	let now = Utc::now();
	Schedule {
		id,
		cron_expr: cron_expr.to_string(),
		action: action.to_string(),
		payload: payload.to_string(),
		description: format!("{action} #{id}"),
		is_enabled: true,
		created_at: now,
		updated_at: now,
	}
}

pub(crate) fn context(namespace: &str, store: Arc<MemoryStore>, publisher: Arc<RecordingPublisher>) -> NamespaceContext {
	NamespaceContext {
		namespace: NamespaceId::new(namespace),
		store: store.clone(),
		publisher,
		initializer: store,
	}
}

#[derive(Default)]
struct RecordingState {
	timers: Vec<(TimerHandle, String, TimerCallback)>,
	add_calls: usize,
	remove_calls: usize,
	started: bool,
	shutdown: bool,
}

/// Engine that records calls and fires only on demand.
#[derive(Default)]
pub(crate) struct RecordingEngine {
	state: Mutex<RecordingState>,
	fail_spec: Option<String>,
}

impl RecordingEngine {
	/// Rejects `add` for this exact spec even though it parses.
	pub(crate) fn failing_on(spec: &str) -> Self {
		Self {
			fail_spec: Some(spec.to_string()),
			..Default::default()
		}
	}

	pub(crate) fn add_calls(&self) -> usize {
		self.state.lock().unwrap().add_calls
	}

	pub(crate) fn remove_calls(&self) -> usize {
		self.state.lock().unwrap().remove_calls
	}

	pub(crate) fn live_count(&self) -> usize {
		self.state.lock().unwrap().timers.len()
	}

	pub(crate) fn is_live(&self, handle: TimerHandle) -> bool {
		self.state.lock().unwrap().timers.iter().any(|(h, _, _)| *h == handle)
	}

	pub(crate) fn specs(&self) -> Vec<String> {
		self.state.lock().unwrap().timers.iter().map(|(_, s, _)| s.clone()).collect()
	}

	pub(crate) fn is_started(&self) -> bool {
		self.state.lock().unwrap().started
	}

	pub(crate) fn is_shut_down(&self) -> bool {
		self.state.lock().unwrap().shutdown
	}

	/// Invoke every live callback once, in registration order.
	pub(crate) async fn fire_all(&self) {
		let callbacks: Vec<TimerCallback> = self
			.state
			.lock()
			.unwrap()
			.timers
			.iter()
			.map(|(_, _, cb)| Arc::clone(cb))
			.collect();
		for callback in callbacks {
			callback().await;
		}
	}
}

#[async_trait]
impl TimerEngine for RecordingEngine {
	async fn add(&self, spec: &str, callback: TimerCallback) -> Result<TimerHandle> {
		let mut state = self.state.lock().unwrap();
		state.add_calls += 1;
		TimerSpec::parse(spec)?;
		if self.fail_spec.as_deref() == Some(spec) {
			return Err(SchedulerError::Internal(format!("engine refused {spec}")));
		}
		let handle = TimerHandle::new();
		state.timers.push((handle, spec.to_string(), callback));
		Ok(handle)
	}

	async fn remove(&self, handle: TimerHandle) -> bool {
		let mut state = self.state.lock().unwrap();
		state.remove_calls += 1;
		let before = state.timers.len();
		state.timers.retain(|(h, _, _)| *h != handle);
		state.timers.len() != before
	}

	async fn start(&self) -> Result<()> {
		self.state.lock().unwrap().started = true;
		Ok(())
	}

	async fn shutdown(&self) {
		self.state.lock().unwrap().shutdown = true;
	}
}

/// Publisher that keeps every accepted task.
#[derive(Default)]
pub(crate) struct RecordingPublisher {
	tasks: Mutex<Vec<PublishedTask>>,
	failing: AtomicBool,
}

impl RecordingPublisher {
	pub(crate) fn tasks(&self) -> Vec<PublishedTask> {
		self.tasks.lock().unwrap().clone()
	}

	pub(crate) fn topics(&self) -> Vec<String> {
		self.tasks.lock().unwrap().iter().map(|t| t.topic.clone()).collect()
	}

	pub(crate) fn set_failing(&self, failing: bool) {
		self.failing.store(failing, Ordering::SeqCst);
	}
}

#[async_trait]
impl TaskPublisher for RecordingPublisher {
	async fn publish(&self, topic: &str, metadata: Metadata, payload: Vec<u8>) -> Result<()> {
		if self.failing.load(Ordering::SeqCst) {
			return Err(SchedulerError::Publish("broker unavailable".to_string()));
		}
		self.tasks.lock().unwrap().push(PublishedTask {
			topic: topic.to_string(),
			metadata,
			payload,
		});
		Ok(())
	}
}

/// Schedule store keyed by namespace, with switchable failures.
#[derive(Default)]
pub(crate) struct MemoryStore {
	schedules: Mutex<HashMap<NamespaceId, Vec<Schedule>>>,
	failing: Mutex<HashSet<NamespaceId>>,
	schema_failing: AtomicBool,
	schema_calls: AtomicUsize,
}

impl MemoryStore {
	pub(crate) fn set(&self, namespace: &NamespaceId, schedules: Vec<Schedule>) {
		self.schedules.lock().unwrap().insert(namespace.clone(), schedules);
	}

	pub(crate) fn fail(&self, namespace: &NamespaceId) {
		self.failing.lock().unwrap().insert(namespace.clone());
	}

	pub(crate) fn heal(&self, namespace: &NamespaceId) {
		self.failing.lock().unwrap().remove(namespace);
	}

	pub(crate) fn set_schema_failing(&self, failing: bool) {
		self.schema_failing.store(failing, Ordering::SeqCst);
	}

	pub(crate) fn schema_calls(&self) -> usize {
		self.schema_calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl ScheduleStore for MemoryStore {
	async fn list_enabled_schedules(&self, namespace: &NamespaceId) -> Result<Vec<Schedule>> {
		if self.failing.lock().unwrap().contains(namespace) {
			return Err(SchedulerError::Store(format!("{namespace}: connection refused")));
		}
		Ok(self
			.schedules
			.lock()
			.unwrap()
			.get(namespace)
			.map(|all| all.iter().filter(|s| s.is_enabled).cloned().collect())
			.unwrap_or_default())
	}
}

#[async_trait]
impl SchemaInitializer for MemoryStore {
	async fn ensure_schema(&self, namespace: &NamespaceId) -> Result<()> {
		self.schema_calls.fetch_add(1, Ordering::SeqCst);
		if self.schema_failing.load(Ordering::SeqCst) {
			return Err(SchedulerError::Store(format!("{namespace}: schema migration failed")));
		}
		Ok(())
	}
}

/// Store whose fetch never completes.
pub(crate) struct StalledStore;

#[async_trait]
impl ScheduleStore for StalledStore {
	async fn list_enabled_schedules(&self, _namespace: &NamespaceId) -> Result<Vec<Schedule>> {
		std::future::pending().await
	}
}
