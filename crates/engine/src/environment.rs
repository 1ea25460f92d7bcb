// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution environment provisioning.
//!
//! Environments are shared by every run with the same
//! `(workspace, configuration, deps digest)` key and built at most
//! once per digest: the builder holds the `env:<digest>` advisory lock
//! for the duration. Workers that lose the lock race report `Busy` and
//! requeue their run with a short delay instead of racing the build.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use rf_core::{Clock, EnvKey, EnvStatus, Environment, WorkerId};
use rf_queue::{QueueError, WorkQueue};

#[derive(Debug, Error)]
pub enum EnvError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// The environment cannot be built; runs needing it fail permanently.
    #[error("environment build failed: {0}")]
    Build(String),
}

/// Result of an ensure call.
#[derive(Debug)]
pub enum EnvOutcome {
    Ready(Environment),
    /// Another worker holds the build lock; retry shortly.
    Busy,
}

pub struct EnvironmentManager<C: Clock> {
    queue: Arc<WorkQueue>,
    clock: C,
    python_bin: String,
    lock_ttl: Duration,
}

impl<C: Clock> EnvironmentManager<C> {
    pub fn new(queue: Arc<WorkQueue>, clock: C, python_bin: impl Into<String>) -> Self {
        Self {
            queue,
            clock,
            python_bin: python_bin.into(),
            lock_ttl: Duration::from_secs(60),
        }
    }

    /// Make sure the environment for `key` exists and is ready.
    pub async fn ensure(&self, key: &EnvKey, owner: &WorkerId) -> Result<EnvOutcome, EnvError> {
        self.queue.ensure_environment(key, EnvStatus::Queued)?;
        if let Some(ready) = self.ready_or_failed(key)? {
            return Ok(ready);
        }

        let now = self.clock.epoch_ms();
        let lock = key.lock_name();
        if !self
            .queue
            .try_lock(&lock, owner.as_str(), self.lock_ttl.as_millis() as u64, now)?
        {
            return Ok(EnvOutcome::Busy);
        }

        // Double-check after winning the lock: another worker may have
        // finished the build while we waited.
        let result = match self.ready_or_failed(key) {
            Ok(Some(outcome)) => Ok(outcome),
            Ok(None) => self.build(key).await,
            Err(e) => Err(e),
        };
        if let Err(error) = self.queue.unlock(&lock, owner.as_str()) {
            tracing::warn!(%error, lock, "failed to release environment build lock");
        }
        result
    }

    fn ready_or_failed(&self, key: &EnvKey) -> Result<Option<EnvOutcome>, EnvError> {
        match self.queue.environment(key)? {
            Some(env) if env.status == EnvStatus::Ready => Ok(Some(EnvOutcome::Ready(env))),
            Some(env) if env.status == EnvStatus::Failed => Err(EnvError::Build(
                "environment build previously failed".to_string(),
            )),
            _ => Ok(None),
        }
    }

    async fn build(&self, key: &EnvKey) -> Result<EnvOutcome, EnvError> {
        let now = self.clock.epoch_ms();
        self.queue
            .mark_environment(key, EnvStatus::Building, None, None, now)?;
        tracing::info!(digest = %key.deps_digest, "building environment");

        match self.probe_interpreter().await {
            Ok(interpreter) => {
                let runtime = env!("CARGO_PKG_VERSION");
                self.queue.mark_environment(
                    key,
                    EnvStatus::Ready,
                    Some(&interpreter),
                    Some(runtime),
                    self.clock.epoch_ms(),
                )?;
                let env = self
                    .queue
                    .environment(key)?
                    .ok_or_else(|| EnvError::Build("environment row vanished".to_string()))?;
                Ok(EnvOutcome::Ready(env))
            }
            Err(message) => {
                self.queue.mark_environment(
                    key,
                    EnvStatus::Failed,
                    None,
                    None,
                    self.clock.epoch_ms(),
                )?;
                Err(EnvError::Build(message))
            }
        }
    }

    /// Capture the interpreter version the sandbox children will run.
    async fn probe_interpreter(&self) -> Result<String, String> {
        let output = tokio::time::timeout(
            Duration::from_secs(10),
            tokio::process::Command::new(&self.python_bin)
                .arg("--version")
                .output(),
        )
        .await
        .map_err(|_| "interpreter probe timed out".to_string())?
        .map_err(|e| format!("interpreter probe failed: {e}"))?;
        if !output.status.success() {
            return Err(format!("interpreter probe exited with {}", output.status));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(test)]
#[path = "environment_tests.rs"]
mod tests;
