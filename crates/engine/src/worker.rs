// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker loop.
//!
//! Claim a batch, and for each claim: ensure the execution environment,
//! start a heartbeat task, load the plugin into a fresh per-run sandbox
//! host, run the pipeline, acknowledge the outcome. Retries use
//! exponential backoff and only apply to retryable failures below the
//! run's attempt cap; cancellation observed mid-run aborts without an
//! ack, since the row is already terminal.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use rf_core::{Clock, EventSink, RunId, RunStatus, WorkerId};
use rf_mapper::MapperConfig;
use rf_queue::{Backoff, Claim, QueueError, WorkQueue};
use rf_sandbox::{PluginHost, SandboxOptions};

use crate::environment::{EnvError, EnvOutcome, EnvironmentManager};
use crate::error::PipelineError;
use crate::pipeline::{run_pipeline, CancelProbe, PipelineContext, PipelineOutput};
use crate::stores::{ConfigStore, DocumentStore};

/// Worker tuning knobs.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Idle sleep between empty polls.
    pub poll_interval: Duration,
    /// Maximum claims per poll.
    pub batch_limit: u32,
    /// Retry schedule for failed attempts.
    pub backoff: Backoff,
    pub sandbox: SandboxOptions,
    pub mapper: MapperConfig,
    /// Region label for detectors and hooks.
    pub region: String,
    /// Requeue delay when the environment build lock is contended.
    pub env_retry: Duration,
    /// Lease renewal cadence; keep well under the queue's lease.
    pub heartbeat_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            batch_limit: 4,
            backoff: Backoff::default(),
            sandbox: SandboxOptions::default(),
            mapper: MapperConfig::default(),
            region: "Sheet1".to_string(),
            env_retry: Duration::from_secs(2),
            heartbeat_interval: Duration::from_secs(15),
        }
    }
}

struct QueueCancelProbe {
    queue: Arc<WorkQueue>,
    run_id: RunId,
}

impl CancelProbe for QueueCancelProbe {
    fn is_cancelled(&self) -> bool {
        matches!(
            self.queue.status(&self.run_id),
            Ok(Some(RunStatus::Cancelled))
        )
    }
}

pub struct Worker<C: Clock> {
    id: WorkerId,
    queue: Arc<WorkQueue>,
    documents: Arc<dyn DocumentStore>,
    configs: Arc<dyn ConfigStore>,
    envs: EnvironmentManager<C>,
    sink: Arc<dyn EventSink>,
    clock: C,
    config: WorkerConfig,
}

impl<C: Clock> Worker<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: WorkerId,
        queue: Arc<WorkQueue>,
        documents: Arc<dyn DocumentStore>,
        configs: Arc<dyn ConfigStore>,
        sink: Arc<dyn EventSink>,
        clock: C,
        config: WorkerConfig,
    ) -> Self {
        let envs = EnvironmentManager::new(
            Arc::clone(&queue),
            clock.clone(),
            config.sandbox.python_bin.clone(),
        );
        Self {
            id,
            queue,
            documents,
            configs,
            envs,
            sink,
            clock,
            config,
        }
    }

    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    /// Poll until shutdown.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(worker = %self.id, "worker started");
        loop {
            if shutdown.is_cancelled() {
                break;
            }
            let handled = match self.tick().await {
                Ok(n) => n,
                Err(error) => {
                    tracing::error!(worker = %self.id, %error, "poll failed");
                    0
                }
            };
            if handled == 0 {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                }
            }
        }
        tracing::info!(worker = %self.id, "worker stopped");
    }

    /// Claim and process one batch. Returns the number of claims handled.
    pub async fn tick(&self) -> Result<usize, QueueError> {
        let claims = self
            .queue
            .claim(&self.id, self.config.batch_limit, self.clock.epoch_ms())?;
        let handled = claims.len();
        for claim in claims {
            self.process(claim).await;
        }
        Ok(handled)
    }

    async fn process(&self, claim: Claim) {
        let run_id = claim.run_id.clone();
        tracing::info!(worker = %self.id, run = %run_id, attempt = claim.attempt_count, "processing run");

        // Resolve the execution environment first; a contended build
        // lock requeues the run rather than blocking the worker.
        match self.envs.ensure(&claim.env_key(), &self.id).await {
            Ok(EnvOutcome::Ready(_)) => {}
            Ok(EnvOutcome::Busy) => {
                let retry_at = self.clock.epoch_ms() + self.config.env_retry.as_millis() as u64;
                self.fail(&run_id, "environment build in progress", Some(retry_at));
                return;
            }
            Err(EnvError::Build(message)) => {
                self.fail(&run_id, &message, None);
                return;
            }
            Err(EnvError::Queue(error)) => {
                let retry_at = self.retry_at(&claim);
                self.fail(&run_id, &error.to_string(), retry_at);
                return;
            }
        }

        // Renew the lease while the pipeline runs.
        let heartbeat = self.spawn_heartbeat(run_id.clone());
        let result = self.execute(&claim).await;
        heartbeat.abort();

        match result {
            Ok(output) => {
                if self.ack(|now| self.queue.ack_success(&run_id, &self.id, now)) {
                    tracing::info!(
                        worker = %self.id,
                        run = %run_id,
                        rows = output.table.row_count(),
                        output = %output.output_document_id,
                        "run succeeded"
                    );
                }
            }
            Err(error) if error.is_cancelled() => {
                tracing::info!(worker = %self.id, run = %run_id, "run cancelled, aborting");
            }
            Err(error) => {
                let retry_at = if error.is_retryable() {
                    self.retry_at(&claim)
                } else {
                    None
                };
                self.fail(&run_id, &error.to_string(), retry_at);
            }
        }
    }

    /// Backoff target for the claim's attempt, or `None` at the cap.
    fn retry_at(&self, claim: &Claim) -> Option<u64> {
        if claim.attempt_count >= claim.max_attempts {
            return None;
        }
        let delay = self.config.backoff.delay_for_attempt(claim.attempt_count);
        Some(self.clock.epoch_ms() + delay)
    }

    fn ack(&self, op: impl FnOnce(u64) -> Result<bool, QueueError>) -> bool {
        match op(self.clock.epoch_ms()) {
            Ok(true) => true,
            Ok(false) => {
                tracing::warn!(worker = %self.id, "lost ownership before ack");
                false
            }
            Err(error) => {
                tracing::error!(worker = %self.id, %error, "ack failed");
                false
            }
        }
    }

    fn fail(&self, run_id: &RunId, message: &str, retry_at: Option<u64>) {
        tracing::warn!(worker = %self.id, run = %run_id, retry = retry_at.is_some(), message, "run attempt failed");
        self.ack(|now| {
            self.queue
                .ack_failure(run_id, &self.id, now, message, retry_at)
        });
    }

    fn spawn_heartbeat(&self, run_id: RunId) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let worker_id = self.id.clone();
        let clock = self.clock.clone();
        let interval = self.config.heartbeat_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                match queue.heartbeat(&run_id, &worker_id, clock.epoch_ms()) {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::warn!(run = %run_id, "heartbeat refused, lease lost");
                        break;
                    }
                    Err(error) => {
                        tracing::error!(run = %run_id, %error, "heartbeat failed");
                    }
                }
            }
        })
    }

    async fn execute(&self, claim: &Claim) -> Result<PipelineOutput, PipelineError> {
        let session = PluginHost::spawn(self.config.sandbox.clone()).map_err(|e| {
            PipelineError::pipeline(rf_core::Phase::LoadConfig, e.to_string(), false)
        })?;
        let cancel = QueueCancelProbe {
            queue: Arc::clone(&self.queue),
            run_id: claim.run_id.clone(),
        };
        let ctx = PipelineContext {
            run_id: claim.run_id.clone(),
            config_id: &claim.config_id,
            document_id: &claim.document_id,
            region: &self.config.region,
            mapper: &self.config.mapper,
            session: &session,
            documents: self.documents.as_ref(),
            configs: self.configs.as_ref(),
            sink: self.sink.as_ref(),
            cancel: &cancel,
        };
        let result = run_pipeline(&ctx).await;
        session.shutdown().await;
        result
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
