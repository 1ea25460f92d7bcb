// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration.
//!
//! Loaded from a TOML file (path via `RF_CONFIG`, default
//! `rowforge.toml` when present), with a handful of environment
//! overrides for deployment knobs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use rf_engine::WorkerConfig;
use rf_mapper::MapperConfig;
use rf_queue::{Backoff, QueueConfig};
use rf_sandbox::SandboxOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// SQLite database holding runs, environments and locks.
    pub db_path: PathBuf,
    /// Root for document and plugin-source storage.
    pub data_dir: PathBuf,
    pub workers: usize,
    pub poll_interval_ms: u64,
    pub lease_ms: u64,
    pub batch_limit: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub sweep_interval_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub python_bin: String,
    pub region: String,
    pub score_threshold: f64,
    pub reusable_fields: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("rowforge.db"),
            data_dir: PathBuf::from("data"),
            workers: 2,
            poll_interval_ms: 1_000,
            lease_ms: 60_000,
            batch_limit: 4,
            backoff_base_ms: 5_000,
            backoff_max_ms: 15 * 60 * 1_000,
            sweep_interval_ms: 10_000,
            heartbeat_interval_ms: 15_000,
            python_bin: "python3".to_string(),
            region: "Sheet1".to_string(),
            score_threshold: 0.5,
            reusable_fields: Vec::new(),
        }
    }
}

impl Config {
    /// Load from `path`, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                toml::from_str(&text).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(db) = std::env::var("RF_DB_PATH") {
            self.db_path = PathBuf::from(db);
        }
        if let Ok(dir) = std::env::var("RF_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(python) = std::env::var("RF_PYTHON_BIN") {
            self.python_bin = python;
        }
        if let Some(workers) = env_parse::<usize>("RF_WORKERS") {
            self.workers = workers.max(1);
        }
        if let Some(lease) = env_parse::<u64>("RF_LEASE_MS") {
            self.lease_ms = lease;
        }
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.data_dir.join("documents")
    }

    pub fn configs_dir(&self) -> PathBuf {
        self.data_dir.join("configs")
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            lease_ms: self.lease_ms,
        }
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.backoff_base_ms, self.backoff_max_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            batch_limit: self.batch_limit,
            backoff: self.backoff(),
            sandbox: SandboxOptions {
                python_bin: self.python_bin.clone(),
                ..Default::default()
            },
            mapper: MapperConfig {
                score_threshold: self.score_threshold,
                reusable_fields: self.reusable_fields.clone(),
                ..Default::default()
            },
            region: self.region.clone(),
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            ..Default::default()
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
