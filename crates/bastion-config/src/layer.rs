// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial configuration produced by a single source.

use serde::{Deserialize, Serialize};

use crate::sections::{DatabaseConfigLayer, LoggingConfigLayer, NamespacesConfigLayer, SchedulerConfigLayer};

/// One source's view of the configuration. Unset sections and fields are
/// `None` and leave lower-precedence values in place when merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfigLayer {
	pub scheduler: Option<SchedulerConfigLayer>,
	pub database: Option<DatabaseConfigLayer>,
	pub namespaces: Option<NamespacesConfigLayer>,
	pub logging: Option<LoggingConfigLayer>,
}

impl WorkerConfigLayer {
	pub fn merge(&mut self, other: Self) {
		merge_section(&mut self.scheduler, other.scheduler, SchedulerConfigLayer::merge);
		merge_section(&mut self.database, other.database, DatabaseConfigLayer::merge);
		merge_section(&mut self.namespaces, other.namespaces, NamespacesConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: fn(&mut T, T)) {
	let Some(overlay) = other else {
		return;
	};
	match base {
		Some(existing) => merge(existing, overlay),
		None => *base = Some(overlay),
	}
}
