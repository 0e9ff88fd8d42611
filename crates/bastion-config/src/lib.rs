// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for the Bastion scheduler worker.
//!
//! Precedence (highest to lowest):
//! 1. Environment variables (`BASTION_*`)
//! 2. Config file (`/etc/bastion/worker.toml`, or an explicit path)
//! 3. Built-in defaults
//!
//! ```ignore
//! let config = bastion_config::load_config()?;
//! println!("reconciling every {}s", config.scheduler.reconcile_interval_secs);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::WorkerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use chrono_tz::Tz;
use std::path::PathBuf;
use tracing::{debug, info};

// Upper bound for every interval and timeout, in seconds.
const MAX_DURATION_SECS: u64 = 30 * 24 * 3600;

/// Fully resolved worker configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerConfig {
	pub scheduler: SchedulerConfig,
	pub database: DatabaseConfig,
	pub namespaces: NamespacesConfig,
	pub logging: LoggingConfig,
}

impl WorkerConfig {
	/// The configured zone. Validated during loading.
	pub fn timezone(&self) -> Result<Tz, ConfigError> {
		parse_timezone(&self.scheduler.timezone)
	}
}

/// Load configuration from defaults, the system config file and the environment.
pub fn load_config() -> Result<WorkerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(config_path: impl Into<PathBuf>) -> Result<WorkerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

/// Merge `sources` in precedence order and finalize the result.
pub fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<WorkerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = WorkerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Finalize a merged layer into a validated configuration.
pub fn finalize(layer: WorkerConfigLayer) -> Result<WorkerConfig, ConfigError> {
	let config = WorkerConfig {
		scheduler: layer.scheduler.unwrap_or_default().finalize(),
		database: layer.database.unwrap_or_default().finalize(),
		namespaces: layer.namespaces.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;

	info!(
		reconcile_interval_secs = config.scheduler.reconcile_interval_secs,
		timezone = %config.scheduler.timezone,
		database = %config.database.url,
		namespaces = config.namespaces.names.len(),
		log_format = %config.logging.format,
		"worker configuration loaded"
	);

	Ok(config)
}

fn validate_config(config: &WorkerConfig) -> Result<(), ConfigError> {
	let scheduler = &config.scheduler;
	for (key, value) in [
		("scheduler.reconcile_interval_secs", scheduler.reconcile_interval_secs),
		("scheduler.store_timeout_secs", scheduler.store_timeout_secs),
		("scheduler.publish_timeout_secs", scheduler.publish_timeout_secs),
	] {
		if value == 0 {
			return Err(ConfigError::Validation(format!("{key} must be greater than zero")));
		}
		if value > MAX_DURATION_SECS {
			return Err(ConfigError::Validation(format!(
				"{key} must be at most {MAX_DURATION_SECS} (30 days)"
			)));
		}
	}

	if scheduler.queue_capacity == 0 {
		return Err(ConfigError::Validation(
			"scheduler.queue_capacity must be greater than zero".to_string(),
		));
	}

	parse_timezone(&scheduler.timezone)?;

	if config.namespaces.names.is_empty() {
		return Err(ConfigError::Validation(
			"at least one namespace must be configured".to_string(),
		));
	}

	if config.database.url.trim().is_empty() {
		return Err(ConfigError::Validation("database.url must not be empty".to_string()));
	}

	Ok(())
}

fn parse_timezone(name: &str) -> Result<Tz, ConfigError> {
	name.parse::<Tz>().map_err(|_| ConfigError::InvalidValue {
		key: "scheduler.timezone".to_string(),
		message: format!("unknown IANA time zone '{name}'"),
	})
}
