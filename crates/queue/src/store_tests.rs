// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashSet;
use std::sync::Arc;

use super::*;
use rf_core::{EnvKey, EnvStatus, NewRun, RunId, RunStatus, WorkerId};

const NOW: u64 = 1_000_000;

fn queue() -> WorkQueue {
    WorkQueue::open_in_memory(QueueConfig { lease_ms: 30_000 }).unwrap()
}

fn submit_n(queue: &WorkQueue, n: usize) -> Vec<RunId> {
    (0..n)
        .map(|i| {
            queue
                .submit(
                    &NewRun::new("ws-1", "cfg-1", format!("doc-{i}"), "digest-a"),
                    NOW + i as u64,
                )
                .unwrap()
        })
        .collect()
}

#[test]
fn claim_transitions_to_running_with_lease() {
    let queue = queue();
    let ids = submit_n(&queue, 1);
    let worker = WorkerId::new("wkr-a");

    let claims = queue.claim(&worker, 10, NOW + 10).unwrap();
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].run_id, ids[0]);
    assert_eq!(claims[0].attempt_count, 1);

    let run = queue.get(&ids[0]).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Running);
    assert_eq!(run.claimed_by.as_ref().unwrap(), &worker);
    assert_eq!(run.claim_expires_at_ms, Some(NOW + 10 + 30_000));
    assert_eq!(run.started_at_ms, Some(NOW + 10));
}

#[test]
fn claim_respects_availability_and_order() {
    let queue = queue();
    // Submitted later but available earlier
    let early = queue
        .submit(&NewRun::new("ws", "cfg", "doc-late", "d"), NOW)
        .unwrap();
    let not_yet = queue
        .submit(&NewRun::new("ws", "cfg", "doc-future", "d"), NOW + 500_000)
        .unwrap();

    let claims = queue.claim(&WorkerId::new("wkr-a"), 10, NOW + 1).unwrap();
    let claimed: Vec<&RunId> = claims.iter().map(|c| &c.run_id).collect();
    assert_eq!(claimed, vec![&early]);

    // The future run becomes claimable once time passes its availability
    let claims = queue
        .claim(&WorkerId::new("wkr-a"), 10, NOW + 600_000)
        .unwrap();
    assert_eq!(claims[0].run_id, not_yet);
}

#[test]
fn claims_are_fifo_by_availability() {
    let queue = queue();
    let ids = submit_n(&queue, 5);
    let claims = queue.claim(&WorkerId::new("wkr-a"), 5, NOW + 100).unwrap();
    let order: Vec<RunId> = claims.into_iter().map(|c| c.run_id).collect();
    assert_eq!(order, ids);
}

#[test]
fn concurrent_claims_are_disjoint() {
    let queue = Arc::new(queue());
    submit_n(&queue, 12);

    let mut handles = Vec::new();
    for i in 0..4 {
        let queue = Arc::clone(&queue);
        handles.push(std::thread::spawn(move || {
            let worker = WorkerId::new(format!("wkr-{i}"));
            queue.claim(&worker, 5, NOW + 100).unwrap()
        }));
    }

    let mut seen: HashSet<RunId> = HashSet::new();
    let mut total = 0;
    for handle in handles {
        for claim in handle.join().unwrap() {
            total += 1;
            assert!(seen.insert(claim.run_id.clone()), "run claimed twice");
        }
    }
    assert_eq!(total, 12);
}

#[test]
fn concurrent_claims_across_connections_are_disjoint() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.db");
    let seed = WorkQueue::open(&path, QueueConfig::default()).unwrap();
    submit_n(&seed, 8);
    drop(seed);

    let mut handles = Vec::new();
    for i in 0..2 {
        let path = path.clone();
        handles.push(std::thread::spawn(move || {
            let queue = WorkQueue::open(&path, QueueConfig::default()).unwrap();
            let worker = WorkerId::new(format!("wkr-{i}"));
            queue.claim(&worker, 8, NOW + 100).unwrap()
        }));
    }

    let mut seen: HashSet<RunId> = HashSet::new();
    let mut total = 0;
    for handle in handles {
        for claim in handle.join().unwrap() {
            total += 1;
            assert!(seen.insert(claim.run_id.clone()), "run claimed twice");
        }
    }
    assert_eq!(total, 8);
}

#[test]
fn heartbeat_extends_lease_only_for_owner() {
    let queue = queue();
    let ids = submit_n(&queue, 1);
    let owner = WorkerId::new("wkr-owner");
    let intruder = WorkerId::new("wkr-intruder");
    queue.claim(&owner, 1, NOW).unwrap();

    assert!(queue.heartbeat(&ids[0], &owner, NOW + 5_000).unwrap());
    let run = queue.get(&ids[0]).unwrap().unwrap();
    assert_eq!(run.claim_expires_at_ms, Some(NOW + 5_000 + 30_000));

    assert!(!queue.heartbeat(&ids[0], &intruder, NOW + 6_000).unwrap());
}

#[test]
fn ack_success_requires_ownership() {
    let queue = queue();
    let ids = submit_n(&queue, 1);
    let owner = WorkerId::new("wkr-owner");
    queue.claim(&owner, 1, NOW).unwrap();

    assert!(!queue
        .ack_success(&ids[0], &WorkerId::new("wkr-other"), NOW + 1)
        .unwrap());
    assert!(queue.ack_success(&ids[0], &owner, NOW + 2).unwrap());

    let run = queue.get(&ids[0]).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Succeeded);
    assert_eq!(run.completed_at_ms, Some(NOW + 2));
    assert!(run.claimed_by.is_none());

    // Terminal rows ignore further acks
    assert!(!queue.ack_success(&ids[0], &owner, NOW + 3).unwrap());
}

#[test]
fn ack_failure_with_retry_requeues() {
    let queue = queue();
    let ids = submit_n(&queue, 1);
    let worker = WorkerId::new("wkr-a");
    queue.claim(&worker, 1, NOW).unwrap();

    assert!(queue
        .ack_failure(&ids[0], &worker, NOW + 1, "sandbox timeout", Some(NOW + 8_000))
        .unwrap());

    let run = queue.get(&ids[0]).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Queued);
    assert_eq!(run.available_at_ms, NOW + 8_000);
    assert_eq!(run.error_message.as_deref(), Some("sandbox timeout"));
    assert!(run.claimed_by.is_none());

    // Not claimable until the retry time
    assert!(queue.claim(&worker, 1, NOW + 2).unwrap().is_empty());
    let claims = queue.claim(&worker, 1, NOW + 8_000).unwrap();
    assert_eq!(claims[0].attempt_count, 2);
    // Claiming clears the previous attempt's error
    let run = queue.get(&ids[0]).unwrap().unwrap();
    assert!(run.error_message.is_none());
}

#[test]
fn ack_failure_without_retry_is_terminal() {
    let queue = queue();
    let ids = submit_n(&queue, 1);
    let worker = WorkerId::new("wkr-a");
    queue.claim(&worker, 1, NOW).unwrap();

    assert!(queue
        .ack_failure(&ids[0], &worker, NOW + 1, "contract violation", None)
        .unwrap());
    let run = queue.get(&ids[0]).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error_message.as_deref(), Some("contract violation"));
}

#[test]
fn expired_lease_requeues_with_backoff() {
    let queue = queue();
    let ids = submit_n(&queue, 1);
    let worker = WorkerId::new("wkr-dead");
    queue.claim(&worker, 1, NOW).unwrap();

    // Lease is NOW + 30_000; sweep after it passes
    let sweep_at = NOW + 31_000;
    let backoff = Backoff::new(2_000, 60_000);
    let swept = queue.expire_leases(sweep_at, &backoff).unwrap();
    assert_eq!(swept, 1);

    let run = queue.get(&ids[0]).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Queued);
    // attempt_count is 1, so the delay is the base
    assert_eq!(run.available_at_ms, sweep_at + 2_000);
    assert!(run.claimed_by.is_none());
    assert!(run.claim_expires_at_ms.is_none());
}

#[test]
fn expired_lease_backoff_doubles_with_attempts() {
    let queue = queue();
    let ids = submit_n(&queue, 1);
    let worker = WorkerId::new("wkr-dead");
    let backoff = Backoff::new(2_000, 60_000);

    // Attempt 1 -> sweep
    queue.claim(&worker, 1, NOW).unwrap();
    let first_sweep = NOW + 31_000;
    queue.expire_leases(first_sweep, &backoff).unwrap();

    // Attempt 2 -> sweep; delay should double
    let second_claim = first_sweep + 2_000;
    queue.claim(&worker, 1, second_claim).unwrap();
    let second_sweep = second_claim + 31_000;
    queue.expire_leases(second_sweep, &backoff).unwrap();

    let run = queue.get(&ids[0]).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Queued);
    assert_eq!(run.attempt_count, 2);
    assert_eq!(run.available_at_ms, second_sweep + 4_000);
}

#[test]
fn expired_lease_at_max_attempts_fails_terminally() {
    let queue = queue();
    let id = queue
        .submit(
            &NewRun::new("ws", "cfg", "doc", "d").max_attempts(1),
            NOW,
        )
        .unwrap();
    queue.claim(&WorkerId::new("wkr-a"), 1, NOW).unwrap();

    let swept = queue
        .expire_leases(NOW + 31_000, &Backoff::default())
        .unwrap();
    assert_eq!(swept, 1);

    let run = queue.get(&id).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run
        .error_message
        .as_deref()
        .unwrap()
        .contains("lease expired"));
}

#[test]
fn unexpired_leases_are_left_alone() {
    let queue = queue();
    submit_n(&queue, 1);
    queue.claim(&WorkerId::new("wkr-a"), 1, NOW).unwrap();
    let swept = queue
        .expire_leases(NOW + 1_000, &Backoff::default())
        .unwrap();
    assert_eq!(swept, 0);
}

#[test]
fn exhausted_runs_are_never_claimed() {
    let queue = queue();
    let id = queue
        .submit(&NewRun::new("ws", "cfg", "doc", "d").max_attempts(1), NOW)
        .unwrap();
    let worker = WorkerId::new("wkr-a");
    queue.claim(&worker, 1, NOW).unwrap();
    queue
        .ack_failure(&id, &worker, NOW + 1, "boom", Some(NOW + 2))
        .unwrap();

    // attempt_count == max_attempts, so the requeued row is not eligible
    assert!(queue.claim(&worker, 1, NOW + 10).unwrap().is_empty());
}

#[test]
fn cancel_is_observable_and_blocks_acks() {
    let queue = queue();
    let ids = submit_n(&queue, 1);
    let worker = WorkerId::new("wkr-a");
    queue.claim(&worker, 1, NOW).unwrap();

    assert!(queue.cancel(&ids[0], NOW + 1).unwrap());
    assert_eq!(
        queue.status(&ids[0]).unwrap(),
        Some(RunStatus::Cancelled)
    );

    // The worker has lost ownership: no heartbeat, no acks
    assert!(!queue.heartbeat(&ids[0], &worker, NOW + 2).unwrap());
    assert!(!queue.ack_success(&ids[0], &worker, NOW + 2).unwrap());
    // Cancelling twice is a no-op
    assert!(!queue.cancel(&ids[0], NOW + 3).unwrap());
}

#[test]
fn advisory_lock_excludes_other_owners() {
    let queue = queue();
    assert!(queue.try_lock("env:digest-a", "wkr-1", 10_000, NOW).unwrap());
    assert!(!queue.try_lock("env:digest-a", "wkr-2", 10_000, NOW).unwrap());
    // Re-acquire by the holder refreshes
    assert!(queue.try_lock("env:digest-a", "wkr-1", 10_000, NOW + 1).unwrap());

    assert!(queue.unlock("env:digest-a", "wkr-1").unwrap());
    assert!(queue.try_lock("env:digest-a", "wkr-2", 10_000, NOW + 2).unwrap());
}

#[test]
fn advisory_lock_expires() {
    let queue = queue();
    assert!(queue.try_lock("env:digest-a", "wkr-1", 5_000, NOW).unwrap());
    // Held: not yet expired
    assert!(!queue
        .try_lock("env:digest-a", "wkr-2", 5_000, NOW + 4_999)
        .unwrap());
    // Expired: another owner may take it
    assert!(queue
        .try_lock("env:digest-a", "wkr-2", 5_000, NOW + 5_001)
        .unwrap());
}

#[test]
fn environment_rows_upsert_and_mark() {
    let queue = queue();
    let key = EnvKey::new("ws", "cfg", "digest-a");
    assert!(queue.environment(&key).unwrap().is_none());

    queue.ensure_environment(&key, EnvStatus::Queued).unwrap();
    let env = queue.environment(&key).unwrap().unwrap();
    assert_eq!(env.status, EnvStatus::Queued);

    // ensure again does not reset
    queue
        .mark_environment(&key, EnvStatus::Ready, Some("Python 3.11"), Some("0.1.0"), NOW)
        .unwrap();
    queue.ensure_environment(&key, EnvStatus::Queued).unwrap();
    let env = queue.environment(&key).unwrap().unwrap();
    assert_eq!(env.status, EnvStatus::Ready);
    assert_eq!(env.interpreter_version.as_deref(), Some("Python 3.11"));
    assert_eq!(env.runtime_version.as_deref(), Some("0.1.0"));
    assert_eq!(env.built_at_ms, Some(NOW));
}
