// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lease-expiry sweeper.
//!
//! Runs independently of the workers and is the only recovery path for
//! orphaned runs: a crashed worker stops heartbeating, its lease lapses
//! and the sweep requeues the run (or fails it at the attempt cap).

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use rf_core::Clock;
use rf_queue::{Backoff, QueueError, WorkQueue};

pub struct LeaseSweeper<C: Clock> {
    queue: Arc<WorkQueue>,
    clock: C,
    interval: Duration,
    backoff: Backoff,
}

impl<C: Clock> LeaseSweeper<C> {
    pub fn new(queue: Arc<WorkQueue>, clock: C, interval: Duration, backoff: Backoff) -> Self {
        Self {
            queue,
            clock,
            interval,
            backoff,
        }
    }

    /// Sweep on a fixed interval until shutdown.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "sweeper started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
            if let Err(error) = self.sweep_once() {
                tracing::error!(%error, "lease sweep failed");
            }
        }
        tracing::info!("sweeper stopped");
    }

    /// One sweep pass. Returns the number of reclaimed runs.
    pub fn sweep_once(&self) -> Result<u64, QueueError> {
        self.queue
            .expire_leases(self.clock.epoch_ms(), &self.backoff)
    }
}

#[cfg(test)]
#[path = "sweeper_tests.rs"]
mod tests;
