// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Submit-to-output: a valid plugin and a 2-column, 3-row document
//! produce a mapped table with column 0 renamed and all data rows kept.

use std::sync::Arc;

use rf_core::{Clock, CollectSink, EventSink, NewRun, RunEvent, RunOutcome, RunStatus, SystemClock, WorkerId};
use rf_engine::{ConfigStore, DocumentStore, FsConfigStore, FsDocumentStore, Worker, WorkerConfig};
use rf_queue::{QueueConfig, WorkQueue};

const PLUGIN: &str = r#"
"""
name: expenses
description: Normalizes expense exports
version: 2.0.0
"""

def register(registry):
    registry.field("A", required=True)

    @registry.detector("A", priority=10)
    def detect_a(column):
        score = 0.9 if column["index"] == 0 else 0.0
        return {"scores": {"A": score}}
"#;

const DOCUMENT: &str = "Amount USD,Memo\n1.50,coffee\n2.75,tea\n3.10,juice\n";

#[tokio::test]
async fn submitted_run_produces_mapped_output() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("configs")).unwrap();
    std::fs::create_dir_all(dir.path().join("documents")).unwrap();
    std::fs::write(dir.path().join("configs/expenses.py"), PLUGIN).unwrap();
    std::fs::write(dir.path().join("documents/expenses-march.csv"), DOCUMENT).unwrap();

    let queue = Arc::new(
        WorkQueue::open(&dir.path().join("rowforge.db"), QueueConfig::default()).unwrap(),
    );
    let documents: Arc<FsDocumentStore> =
        Arc::new(FsDocumentStore::new(dir.path().join("documents")));
    let configs: Arc<dyn ConfigStore> = Arc::new(FsConfigStore::new(dir.path().join("configs")));
    let sink = Arc::new(CollectSink::new());

    let worker = Worker::new(
        WorkerId::new("wkr-e2e"),
        Arc::clone(&queue),
        Arc::clone(&documents) as Arc<dyn DocumentStore>,
        configs,
        Arc::clone(&sink) as Arc<dyn EventSink>,
        SystemClock,
        WorkerConfig::default(),
    );

    let run_id = queue
        .submit(
            &NewRun::new("ws-1", "expenses", "expenses-march.csv", "digest-e2e"),
            SystemClock.epoch_ms(),
        )
        .unwrap();

    assert_eq!(worker.tick().await.unwrap(), 1);

    let run = queue.get(&run_id).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Succeeded, "error: {:?}", run.error_message);

    let output = documents.get(&format!("{run_id}.out.csv")).await.unwrap();
    let text = String::from_utf8(output).unwrap();
    let lines: Vec<&str> = text.trim_end().lines().collect();
    assert_eq!(lines, vec!["A", "1.50", "2.75", "3.10"]);

    // Ordered lifecycle telemetry ends in a successful summary
    let events = sink.events();
    assert!(matches!(
        events.first().unwrap(),
        RunEvent::PhaseStarted { .. }
    ));
    assert!(matches!(
        events.last().unwrap(),
        RunEvent::RunSummary {
            outcome: RunOutcome::Succeeded,
            ..
        }
    ));
    assert!(events
        .iter()
        .any(|e| matches!(e, RunEvent::TableMapped { mapped: 1, unmapped: 0, .. })));

    // The environment was built exactly once and recorded as ready
    let env = queue
        .environment(&rf_core::EnvKey::new("ws-1", "expenses", "digest-e2e"))
        .unwrap()
        .unwrap();
    assert_eq!(env.status, rf_core::EnvStatus::Ready);
}
