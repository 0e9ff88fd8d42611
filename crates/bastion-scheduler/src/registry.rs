// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Job registry: the ledger of live timers for stored schedules.

use bastion_scheduler_core::JobHash;
use std::collections::HashMap;

use crate::engine::TimerHandle;

/// Maps each job hash to its live timer handle, in fetch order.
///
/// Mutated only by the reconciler while it holds the namespace's registry lock.
#[derive(Debug, Default)]
pub struct JobRegistry {
	hashes: Vec<JobHash>,
	handles: HashMap<JobHash, TimerHandle>,
}

impl JobRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, hash: &JobHash) -> Option<TimerHandle> {
		self.handles.get(hash).copied()
	}

	pub fn hashes(&self) -> &[JobHash] {
		&self.hashes
	}

	pub fn len(&self) -> usize {
		self.hashes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.hashes.is_empty()
	}

	/// `(hash, handle)` pairs in registration order.
	pub fn entries(&self) -> Vec<(JobHash, TimerHandle)> {
		self.hashes
			.iter()
			.filter_map(|h| self.handles.get(h).map(|handle| (h.clone(), *handle)))
			.collect()
	}

	/// Replace the whole ledger with the result of a reconciliation pass.
	pub(crate) fn replace(&mut self, hashes: Vec<JobHash>, handles: HashMap<JobHash, TimerHandle>) {
		debug_assert_eq!(hashes.len(), handles.len());
		self.hashes = hashes;
		self.handles = handles;
	}
}
