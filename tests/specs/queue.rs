// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue recovery specs: a crashed worker's run is reclaimed by the
//! sweeper and finished by a healthy worker.

use std::sync::Arc;
use std::time::Duration;

use rf_core::{Clock, FakeClock, NewRun, RunStatus, WorkerId};
use rf_engine::LeaseSweeper;
use rf_queue::{Backoff, QueueConfig, WorkQueue};

#[tokio::test]
async fn orphaned_run_is_reclaimed_and_finished() {
    let queue = Arc::new(WorkQueue::open_in_memory(QueueConfig { lease_ms: 30_000 }).unwrap());
    let clock = FakeClock::new();
    let backoff = Backoff::new(1_000, 60_000);

    let id = queue
        .submit(&NewRun::new("ws", "cfg", "doc", "digest"), clock.epoch_ms())
        .unwrap();

    // A worker claims the run, then crashes (no heartbeat, no ack)
    let dead = WorkerId::new("wkr-dead");
    let claims = queue.claim(&dead, 1, clock.epoch_ms()).unwrap();
    assert_eq!(claims.len(), 1);

    // The dead worker's ack is refused once its lease lapses and the
    // sweeper reclaims the row
    clock.advance_ms(31_000);
    let sweeper = LeaseSweeper::new(
        Arc::clone(&queue),
        clock.clone(),
        Duration::from_secs(1),
        backoff,
    );
    assert_eq!(sweeper.sweep_once().unwrap(), 1);
    assert!(!queue.ack_success(&id, &dead, clock.epoch_ms()).unwrap());
    assert_eq!(queue.status(&id).unwrap(), Some(RunStatus::Queued));

    // A healthy worker picks the run up after the backoff and finishes
    clock.advance_ms(backoff.delay_for_attempt(1));
    let healthy = WorkerId::new("wkr-healthy");
    let claims = queue.claim(&healthy, 1, clock.epoch_ms()).unwrap();
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].attempt_count, 2);
    assert!(queue.ack_success(&id, &healthy, clock.epoch_ms()).unwrap());
    assert_eq!(queue.status(&id).unwrap(), Some(RunStatus::Succeeded));
}

#[tokio::test]
async fn lease_expiry_at_attempt_cap_is_terminal() {
    let queue = Arc::new(WorkQueue::open_in_memory(QueueConfig { lease_ms: 10_000 }).unwrap());
    let clock = FakeClock::new();

    let id = queue
        .submit(
            &NewRun::new("ws", "cfg", "doc", "digest").max_attempts(1),
            clock.epoch_ms(),
        )
        .unwrap();
    queue
        .claim(&WorkerId::new("wkr-dead"), 1, clock.epoch_ms())
        .unwrap();

    clock.advance_ms(11_000);
    queue
        .expire_leases(clock.epoch_ms(), &Backoff::default())
        .unwrap();
    assert_eq!(queue.status(&id).unwrap(), Some(RunStatus::Failed));
}
