// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use super::*;
use rf_core::{FakeClock, NewRun, RunStatus, WorkerId};
use rf_queue::{QueueConfig, WorkQueue};

#[tokio::test]
async fn sweep_reclaims_expired_leases() {
    let queue = Arc::new(WorkQueue::open_in_memory(QueueConfig { lease_ms: 10_000 }).unwrap());
    let clock = FakeClock::new();

    let id = queue
        .submit(&NewRun::new("ws", "cfg", "doc", "d"), clock.epoch_ms())
        .unwrap();
    queue
        .claim(&WorkerId::new("wkr-dead"), 1, clock.epoch_ms())
        .unwrap();

    let sweeper = LeaseSweeper::new(
        Arc::clone(&queue),
        clock.clone(),
        Duration::from_millis(50),
        Backoff::new(1_000, 60_000),
    );

    // Lease still valid: nothing to reclaim
    assert_eq!(sweeper.sweep_once().unwrap(), 0);

    clock.advance_ms(11_000);
    assert_eq!(sweeper.sweep_once().unwrap(), 1);
    assert_eq!(queue.status(&id).unwrap(), Some(RunStatus::Queued));
}

#[tokio::test]
async fn run_loop_sweeps_until_shutdown() {
    let queue = Arc::new(WorkQueue::open_in_memory(QueueConfig { lease_ms: 1 }).unwrap());
    let clock = FakeClock::new();
    let id = queue
        .submit(&NewRun::new("ws", "cfg", "doc", "d"), clock.epoch_ms())
        .unwrap();
    queue
        .claim(&WorkerId::new("wkr-dead"), 1, clock.epoch_ms())
        .unwrap();
    clock.advance_ms(10);

    let sweeper = LeaseSweeper::new(
        Arc::clone(&queue),
        clock.clone(),
        Duration::from_millis(10),
        Backoff::default(),
    );
    let shutdown = tokio_util::sync::CancellationToken::new();
    let token = shutdown.clone();
    let handle = tokio::spawn(async move { sweeper.run(token).await });

    // Give the loop a few ticks to reclaim the run
    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown.cancel();
    handle.await.unwrap();

    assert_eq!(queue.status(&id).unwrap(), Some(RunStatus::Queued));
}
