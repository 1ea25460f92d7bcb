// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use super::*;
use rf_core::{EnvKey, EnvStatus, FakeClock, WorkerId};
use rf_queue::{QueueConfig, WorkQueue};

fn setup() -> (Arc<WorkQueue>, FakeClock) {
    let queue = Arc::new(WorkQueue::open_in_memory(QueueConfig::default()).unwrap());
    (queue, FakeClock::new())
}

fn key() -> EnvKey {
    EnvKey::new("ws-1", "cfg-1", "digest-a")
}

#[tokio::test]
async fn builds_once_and_reuses() {
    let (queue, clock) = setup();
    let manager = EnvironmentManager::new(Arc::clone(&queue), clock.clone(), "python3");
    let owner = WorkerId::new("wkr-a");

    let outcome = manager.ensure(&key(), &owner).await.unwrap();
    let EnvOutcome::Ready(env) = outcome else {
        panic!("expected ready environment");
    };
    assert_eq!(env.status, EnvStatus::Ready);
    assert!(env.interpreter_version.unwrap().contains("Python"));
    assert_eq!(env.runtime_version.as_deref(), Some(env!("CARGO_PKG_VERSION")));

    // Second ensure short-circuits on the ready row; the build lock is
    // free again, so another worker succeeds immediately too.
    let other = WorkerId::new("wkr-b");
    assert!(matches!(
        manager.ensure(&key(), &other).await.unwrap(),
        EnvOutcome::Ready(_)
    ));
}

#[tokio::test]
async fn contended_lock_reports_busy() {
    let (queue, clock) = setup();
    let manager = EnvironmentManager::new(Arc::clone(&queue), clock.clone(), "python3");

    // Another worker holds the build lock
    assert!(queue
        .try_lock(&key().lock_name(), "wkr-other", 60_000, clock.epoch_ms())
        .unwrap());

    let outcome = manager
        .ensure(&key(), &WorkerId::new("wkr-a"))
        .await
        .unwrap();
    assert!(matches!(outcome, EnvOutcome::Busy));
}

#[tokio::test]
async fn failed_probe_marks_environment_failed() {
    let (queue, clock) = setup();
    let manager = EnvironmentManager::new(Arc::clone(&queue), clock.clone(), "not-a-python");
    let owner = WorkerId::new("wkr-a");

    let err = manager.ensure(&key(), &owner).await.unwrap_err();
    assert!(matches!(err, EnvError::Build(_)));
    assert_eq!(
        queue.environment(&key()).unwrap().unwrap().status,
        EnvStatus::Failed
    );

    // Subsequent ensures fail fast without re-probing
    let err = manager.ensure(&key(), &owner).await.unwrap_err();
    assert!(matches!(err, EnvError::Build(_)));
    // The build lock was released despite the failure
    assert!(queue
        .try_lock(&key().lock_name(), "wkr-other", 1_000, clock.epoch_ms())
        .unwrap());
}
