// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Task action identifiers.
//!
//! Built-in tasks publish on a topic named after their action. Stored
//! schedules all publish on [`SCHEDULED_TASKS`] and carry their own action
//! inside the message body.

pub const SCHEDULED_TASKS: &str = "scheduled_tasks";

pub const TRIGGER_CONSOLE_ACTIONS: &str = "trigger_console_actions";
pub const CLEAN_UP_GRAPH_DB: &str = "clean_up_graph_db";
pub const COMPUTE_THREAT: &str = "compute_threat";
pub const RETRY_FAILED_SCANS: &str = "retry_failed_scans";
pub const RETRY_FAILED_UPGRADES: &str = "retry_failed_upgrades";
pub const CLEAN_UP_POSTGRESQL: &str = "clean_up_postgresql";
pub const CLEAN_UP_DIAGNOSIS_LOGS: &str = "clean_up_diagnosis_logs";
pub const CLOUD_COMPLIANCE: &str = "cloud_compliance";
pub const CHECK_AGENT_UPGRADE: &str = "check_agent_upgrade";
pub const SYNC_REGISTRY: &str = "sync_registry";
pub const SEND_NOTIFICATION: &str = "send_notification";
pub const REPORT_CLEAN_UP: &str = "report_clean_up";
pub const CACHE_POSTURE_PROVIDERS: &str = "cache_posture_providers";
pub const LINK_CLOUD_RESOURCE: &str = "link_cloud_resource";
pub const LINK_NODES: &str = "link_nodes";
pub const UPDATE_VULNERABILITY_DATABASE: &str = "update_vulnerability_database";
pub const SET_UP_GRAPH_DB: &str = "set_up_graph_db";
