// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Built-in task catalog.

use bastion_scheduler_core::actions;

/// A built-in periodic task: a fixed timer spec and the action it publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticTask {
	pub spec: &'static str,
	pub action: &'static str,
}

impl StaticTask {
	pub const fn new(spec: &'static str, action: &'static str) -> Self {
		Self { spec, action }
	}
}

/// Periodic tasks installed once per namespace at startup.
pub const STATIC_TASKS: &[StaticTask] = &[
	StaticTask::new("@every 30s", actions::TRIGGER_CONSOLE_ACTIONS),
	StaticTask::new("@every 120s", actions::CLEAN_UP_GRAPH_DB),
	StaticTask::new("@every 120s", actions::COMPUTE_THREAT),
	StaticTask::new("@every 120s", actions::RETRY_FAILED_SCANS),
	StaticTask::new("@every 10m", actions::RETRY_FAILED_UPGRADES),
	StaticTask::new("@every 5m", actions::CLEAN_UP_POSTGRESQL),
	StaticTask::new("@every 60m", actions::CLEAN_UP_DIAGNOSIS_LOGS),
	StaticTask::new("@every 60m", actions::CLOUD_COMPLIANCE),
	StaticTask::new("@every 60m", actions::CHECK_AGENT_UPGRADE),
	StaticTask::new("@every 12h", actions::SYNC_REGISTRY),
	StaticTask::new("@every 30s", actions::SEND_NOTIFICATION),
	StaticTask::new("@every 60m", actions::REPORT_CLEAN_UP),
	StaticTask::new("@every 60m", actions::CACHE_POSTURE_PROVIDERS),
	StaticTask::new("@every 30s", actions::LINK_CLOUD_RESOURCE),
	StaticTask::new("@every 30s", actions::LINK_NODES),
	StaticTask::new("@every 120m", actions::UPDATE_VULNERABILITY_DATABASE),
];

/// Actions published once per namespace before periodic work begins.
pub const BOOTSTRAP_TASKS: &[&str] = &[
	actions::SET_UP_GRAPH_DB,
	actions::CHECK_AGENT_UPGRADE,
	actions::SYNC_REGISTRY,
	actions::CLOUD_COMPLIANCE,
	actions::REPORT_CLEAN_UP,
	actions::CACHE_POSTURE_PROVIDERS,
];
