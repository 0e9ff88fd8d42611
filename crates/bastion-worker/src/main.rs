// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bastion scheduler worker binary.

use bastion_config::{LogFormat, WorkerConfig};
use bastion_scheduler::{
	ChannelPublisher, CronTimerEngine, NamespaceDirectory, Scheduler, SchedulerSettings, SqliteScheduleStore,
	StaticNamespaceDirectory,
};
use bastion_scheduler_core::NamespaceId;
use clap::{Parser, Subcommand};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod dispatch;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Bastion worker - cron scheduler for tenant namespaces.
#[derive(Parser, Debug)]
#[command(name = "bastion-worker", about = "Bastion cron scheduler worker", version)]
struct Args {
	/// Path to a TOML config file (defaults to /etc/bastion/worker.toml)
	#[arg(long, env = "BASTION_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version information
	Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("bastion-worker version: {}", env!("CARGO_PKG_VERSION"));
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => bastion_config::load_config_with_file(path)?,
		None => bastion_config::load_config()?,
	};

	init_tracing(&config);

	tracing::info!(
		database = %config.database.url,
		namespaces = ?config.namespaces.names,
		timezone = %config.scheduler.timezone,
		"starting bastion-worker"
	);

	let options = SqliteConnectOptions::from_str(&config.database.url)?.create_if_missing(true);
	let pool = SqlitePoolOptions::new().max_connections(5).connect_with(options).await?;
	let store = Arc::new(SqliteScheduleStore::new(pool));

	let (publisher, rx) = ChannelPublisher::new(config.scheduler.queue_capacity);
	let consumer = tokio::spawn(dispatch::drain(rx));

	let directory: Arc<dyn NamespaceDirectory> = Arc::new(StaticNamespaceDirectory::new(
		config.namespaces.names.iter().map(NamespaceId::new),
		store,
		Arc::new(publisher),
	));

	let engine = Arc::new(CronTimerEngine::new(config.timezone()?).await?);
	let scheduler = Scheduler::new(
		engine,
		SchedulerSettings {
			reconcile_interval: config.scheduler.reconcile_interval(),
			store_timeout: config.scheduler.store_timeout(),
			publish_timeout: config.scheduler.publish_timeout(),
		},
	);

	let report = scheduler.init(Arc::clone(&directory)).await?;
	tracing::info!(
		registered = report.registration.succeeded.len(),
		registration_failed = report.registration.failed.len(),
		bootstrap_failed = report.bootstrap.failed.len(),
		reconcile_failed = report.initial_reconcile.failed.len(),
		"scheduler initialized"
	);
	if report.registration.succeeded.is_empty() {
		tracing::error!("no namespace completed static task registration");
	}

	tokio::signal::ctrl_c().await?;
	tracing::info!("Received shutdown signal");
	scheduler.shutdown().await;

	// The scheduler owns the last publisher handles; dropping it closes the queue.
	drop(scheduler);
	drop(directory);
	if tokio::time::timeout(DRAIN_TIMEOUT, consumer).await.is_err() {
		tracing::warn!("task queue still open after shutdown, abandoning consumer");
	}

	tracing::info!("Worker shutdown complete");
	Ok(())
}

fn init_tracing(config: &WorkerConfig) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| config.logging.level.clone().into());

	match config.logging.format {
		LogFormat::Json => tracing_subscriber::registry()
			.with(filter)
			.with(tracing_subscriber::fmt::layer().json())
			.init(),
		LogFormat::Pretty => tracing_subscriber::registry()
			.with(filter)
			.with(tracing_subscriber::fmt::layer())
			.init(),
	}
}
