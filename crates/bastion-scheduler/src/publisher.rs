// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Task publishing.
//!
//! [`TaskPublisher`] is the seam to the durable task queue. [`ChannelPublisher`]
//! is the in-process implementation: it forwards tasks into a bounded channel
//! drained by the worker.

use async_trait::async_trait;
use bastion_scheduler_core::{namespace_metadata, Metadata, NamespaceId};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::error::{Result, SchedulerError};

/// Sink for triggered tasks.
#[async_trait]
pub trait TaskPublisher: Send + Sync {
	async fn publish(&self, topic: &str, metadata: Metadata, payload: Vec<u8>) -> Result<()>;
}

/// A task accepted by a [`ChannelPublisher`].
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedTask {
	pub topic: String,
	pub metadata: Metadata,
	pub payload: Vec<u8>,
}

/// [`TaskPublisher`] backed by a bounded tokio channel.
#[derive(Clone)]
pub struct ChannelPublisher {
	tx: mpsc::Sender<PublishedTask>,
}

impl ChannelPublisher {
	pub fn new(capacity: usize) -> (Self, mpsc::Receiver<PublishedTask>) {
		let (tx, rx) = mpsc::channel(capacity.max(1));
		(Self { tx }, rx)
	}
}

#[async_trait]
impl TaskPublisher for ChannelPublisher {
	async fn publish(&self, topic: &str, metadata: Metadata, payload: Vec<u8>) -> Result<()> {
		self.tx
			.send(PublishedTask {
				topic: topic.to_string(),
				metadata,
				payload,
			})
			.await
			.map_err(|_| SchedulerError::Publish("task queue is closed".to_string()))
	}
}

/// Publish a namespace-tagged task, bounded by `timeout`.
pub async fn publish_task(
	publisher: &dyn TaskPublisher,
	namespace: &NamespaceId,
	topic: &str,
	payload: Vec<u8>,
	timeout: Duration,
) -> Result<()> {
	let metadata = namespace_metadata(namespace);
	match tokio::time::timeout(timeout, publisher.publish(topic, metadata, payload)).await {
		Ok(result) => result,
		Err(_) => Err(SchedulerError::Timeout {
			operation: "publish",
			timeout,
		}),
	}
}

/// Publish a task and report the outcome. Fires are not retried here.
pub(crate) async fn enqueue(
	publisher: &dyn TaskPublisher,
	namespace: &NamespaceId,
	topic: &str,
	label: &str,
	payload: Vec<u8>,
	timeout: Duration,
) -> Result<()> {
	info!(%namespace, topic, task = label, "enqueuing task");
	let result = publish_task(publisher, namespace, topic, payload, timeout).await;
	if let Err(e) = &result {
		error!(%namespace, topic, task = label, error = %e, "failed to enqueue task");
	}
	result
}
