// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, a TOML file and the environment.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::WorkerConfigLayer;
use crate::sections::{
	DatabaseConfigLayer, LogFormat, LoggingConfigLayer, NamespacesConfigLayer, SchedulerConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<WorkerConfigLayer, ConfigError>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<WorkerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(WorkerConfigLayer::default())
	}
}

/// TOML file source. A missing file is an empty layer.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/bastion/worker.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<WorkerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(WorkerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: WorkerConfigLayer = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: `BASTION_<FIELD>`. Empty variables count as unset.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<WorkerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		load_layer(&|name| std::env::var(name).ok())
	}
}

type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn load_layer(lookup: Lookup<'_>) -> Result<WorkerConfigLayer, ConfigError> {
	let env = Env(lookup);
	Ok(WorkerConfigLayer {
		scheduler: Some(SchedulerConfigLayer {
			reconcile_interval_secs: env.u64("BASTION_RECONCILE_INTERVAL_SECS")?,
			store_timeout_secs: env.u64("BASTION_STORE_TIMEOUT_SECS")?,
			publish_timeout_secs: env.u64("BASTION_PUBLISH_TIMEOUT_SECS")?,
			timezone: env.var("BASTION_TIMEZONE"),
			queue_capacity: env.usize("BASTION_QUEUE_CAPACITY")?,
		}),
		database: Some(DatabaseConfigLayer {
			url: env.var("BASTION_DATABASE_URL"),
		}),
		namespaces: Some(NamespacesConfigLayer {
			names: env.list("BASTION_NAMESPACES"),
		}),
		logging: Some(LoggingConfigLayer {
			level: env.var("BASTION_LOG_LEVEL"),
			format: env.log_format("BASTION_LOG_FORMAT")?,
		}),
	})
}

struct Env<'a>(Lookup<'a>);

impl Env<'_> {
	fn var(&self, name: &str) -> Option<String> {
		(self.0)(name).filter(|s| !s.is_empty())
	}

	fn u64(&self, name: &str) -> Result<Option<u64>, ConfigError> {
		self.parsed(name, "u64")
	}

	fn usize(&self, name: &str) -> Result<Option<usize>, ConfigError> {
		self.parsed(name, "usize")
	}

	fn parsed<T: std::str::FromStr>(&self, name: &str, kind: &str) -> Result<Option<T>, ConfigError> {
		match self.var(name) {
			Some(v) => v.trim().parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid {kind} value '{v}'"),
			}),
			None => Ok(None),
		}
	}

	fn list(&self, name: &str) -> Option<Vec<String>> {
		self.var(name).map(|s| {
			s.split(',')
				.map(|s| s.trim().to_string())
				.filter(|s| !s.is_empty())
				.collect()
		})
	}

	fn log_format(&self, name: &str) -> Result<Option<LogFormat>, ConfigError> {
		match self.var(name) {
			Some(v) => v.parse().map(Some).map_err(|message| ConfigError::InvalidValue {
				key: name.to_string(),
				message,
			}),
			None => Ok(None),
		}
	}
}
