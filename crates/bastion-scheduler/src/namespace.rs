// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Namespace enumeration and per-namespace fan-out.

use async_trait::async_trait;
use bastion_scheduler_core::NamespaceId;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::Result;
use crate::publisher::TaskPublisher;
use crate::store::{ScheduleStore, SchemaInitializer};

/// Tenant identity plus the resources bound to that tenant.
#[derive(Clone)]
pub struct NamespaceContext {
	pub namespace: NamespaceId,
	pub store: Arc<dyn ScheduleStore>,
	pub publisher: Arc<dyn TaskPublisher>,
	pub initializer: Arc<dyn SchemaInitializer>,
}

/// Source of the namespaces the scheduler serves.
#[async_trait]
pub trait NamespaceDirectory: Send + Sync {
	async fn namespaces(&self) -> Result<Vec<NamespaceContext>>;
}

/// A fixed list of namespaces sharing one store and publisher.
pub struct StaticNamespaceDirectory {
	contexts: Vec<NamespaceContext>,
}

impl StaticNamespaceDirectory {
	pub fn new<S>(
		names: impl IntoIterator<Item = NamespaceId>,
		store: Arc<S>,
		publisher: Arc<dyn TaskPublisher>,
	) -> Self
	where
		S: ScheduleStore + SchemaInitializer + 'static,
	{
		let contexts = names
			.into_iter()
			.map(|namespace| NamespaceContext {
				namespace,
				store: Arc::clone(&store) as Arc<dyn ScheduleStore>,
				publisher: Arc::clone(&publisher),
				initializer: Arc::clone(&store) as Arc<dyn SchemaInitializer>,
			})
			.collect();
		Self { contexts }
	}
}

#[async_trait]
impl NamespaceDirectory for StaticNamespaceDirectory {
	async fn namespaces(&self) -> Result<Vec<NamespaceContext>> {
		Ok(self.contexts.clone())
	}
}

/// Outcome of a fan-out over all namespaces.
#[derive(Debug, Default)]
pub struct NamespaceRunSummary {
	pub succeeded: Vec<NamespaceId>,
	pub failed: Vec<(NamespaceId, String)>,
}

impl NamespaceRunSummary {
	pub fn all_succeeded(&self) -> bool {
		self.failed.is_empty()
	}
}

/// Run `f` once per namespace, concurrently.
///
/// A failing namespace is logged under `label` and recorded in the summary;
/// it never affects the others.
pub async fn for_each_namespace<F, Fut>(
	directory: &dyn NamespaceDirectory,
	label: &str,
	f: F,
) -> Result<NamespaceRunSummary>
where
	F: Fn(NamespaceContext) -> Fut,
	Fut: Future<Output = Result<()>>,
{
	let contexts = directory.namespaces().await?;

	let runs = contexts.into_iter().map(|ctx| {
		let namespace = ctx.namespace.clone();
		let fut = f(ctx);
		async move { (namespace, fut.await) }
	});

	let mut summary = NamespaceRunSummary::default();
	for (namespace, result) in join_all(runs).await {
		match result {
			Ok(()) => {
				debug!(%namespace, label, "namespace run completed");
				summary.succeeded.push(namespace);
			}
			Err(e) => {
				error!(%namespace, label, error = %e, "namespace run failed");
				summary.failed.push((namespace, e.to_string()));
			}
		}
	}
	Ok(summary)
}
