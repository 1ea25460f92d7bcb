// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rfd: the rowforge worker daemon.
//!
//! Opens the queue store, spawns the configured number of workers plus
//! the lease sweeper, and drains on ctrl-c.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use rf_core::{EventSink, SystemClock, TracingSink, WorkerId};
use rf_engine::{
    ConfigStore, DocumentStore, FsConfigStore, FsDocumentStore, LeaseSweeper, Worker,
};
use rf_queue::WorkQueue;

use crate::config::Config;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = config_path();
    let config = Config::load(config_path.as_deref())?;
    tracing::info!(
        config = ?config_path,
        db = %config.db_path.display(),
        workers = config.workers,
        "rfd starting"
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(config))
}

/// `RF_CONFIG` wins; otherwise `rowforge.toml` when it exists.
fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("RF_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let default = PathBuf::from("rowforge.toml");
    default.exists().then_some(default)
}

async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let queue = Arc::new(WorkQueue::open(&config.db_path, config.queue_config())?);
    let documents: Arc<dyn DocumentStore> = Arc::new(FsDocumentStore::new(config.documents_dir()));
    let configs: Arc<dyn ConfigStore> = Arc::new(FsConfigStore::new(config.configs_dir()));
    let sink: Arc<dyn EventSink> = Arc::new(TracingSink);

    let shutdown = CancellationToken::new();
    let mut tasks = Vec::new();

    for index in 0..config.workers.max(1) {
        let worker = Worker::new(
            WorkerId::new(format!("wkr-{}-{index}", std::process::id())),
            Arc::clone(&queue),
            Arc::clone(&documents),
            Arc::clone(&configs),
            Arc::clone(&sink),
            SystemClock,
            config.worker_config(),
        );
        let token = shutdown.clone();
        tasks.push(tokio::spawn(async move { worker.run(token).await }));
    }

    let sweeper = LeaseSweeper::new(
        Arc::clone(&queue),
        SystemClock,
        config.sweep_interval(),
        config.backoff(),
    );
    let token = shutdown.clone();
    tasks.push(tokio::spawn(async move { sweeper.run(token).await }));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested, draining");
    shutdown.cancel();
    for task in tasks {
        if let Err(error) = task.await {
            tracing::error!(%error, "task join failed");
        }
    }
    tracing::info!("rfd stopped");
    Ok(())
}
