// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Multi-tenant cron scheduler.
//!
//! Each namespace gets three kinds of timers:
//!
//! - **Static tasks** from a built-in catalog, installed once at startup
//! - **Bootstrap tasks**, published once before periodic work starts
//! - **Scheduled tasks** mirrored from the namespace's [`ScheduleStore`] by the
//!   [`Reconciler`], deduplicated by job hash
//!
//! Fired timers publish through a [`TaskPublisher`] with the namespace in the
//! message metadata. [`Scheduler`] wires these together and runs the periodic
//! reconciliation loop.

pub mod bootstrap;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod namespace;
pub mod publisher;
pub mod reconciler;
pub mod registrar;
pub mod registry;
pub mod scheduler;
pub mod spec;
pub mod sqlite;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use bootstrap::BootstrapRunner;
pub use catalog::{StaticTask, BOOTSTRAP_TASKS, STATIC_TASKS};
pub use engine::{CronTimerEngine, TimerCallback, TimerEngine, TimerHandle};
pub use error::{Result, SchedulerError};
pub use namespace::{
	for_each_namespace, NamespaceContext, NamespaceDirectory, NamespaceRunSummary, StaticNamespaceDirectory,
};
pub use publisher::{publish_task, ChannelPublisher, PublishedTask, TaskPublisher};
pub use reconciler::{ReconcileReport, Reconciler};
pub use registrar::StaticTaskRegistrar;
pub use registry::JobRegistry;
pub use scheduler::{InitReport, Scheduler, SchedulerSettings};
pub use spec::{validate_timer_spec, TimerSpec};
pub use sqlite::{NewSchedule, SqliteScheduleStore};
pub use store::{ScheduleStore, SchemaInitializer};
