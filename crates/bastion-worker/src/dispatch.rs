// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Consumer side of the in-process task queue.

use bastion_scheduler::PublishedTask;
use bastion_scheduler_core::NAMESPACE_KEY;
use tokio::sync::mpsc;
use tracing::info;

/// Log every task until all publishers are dropped. Returns the number of
/// tasks seen.
pub async fn drain(mut rx: mpsc::Receiver<PublishedTask>) -> usize {
	let mut count = 0;
	while let Some(task) = rx.recv().await {
		count += 1;
		let namespace = task.metadata.get(NAMESPACE_KEY).map(String::as_str).unwrap_or("");
		info!(
			topic = %task.topic,
			namespace,
			payload_bytes = task.payload.len(),
			payload = %String::from_utf8_lossy(&task.payload),
			"dispatched task"
		);
	}
	info!(count, "task queue closed");
	count
}
