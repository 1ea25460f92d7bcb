// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn defaults_are_sane() {
    let config = Config::default();
    assert_eq!(config.workers, 2);
    assert_eq!(config.lease_ms, 60_000);
    assert_eq!(config.python_bin, "python3");
    assert!((config.score_threshold - 0.5).abs() < f64::EPSILON);
}

#[test]
fn loads_partial_toml_over_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rowforge.toml");
    std::fs::write(
        &path,
        "workers = 8\nlease_ms = 30000\nreusable_fields = [\"currency\"]\n",
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.workers, 8);
    assert_eq!(config.lease_ms, 30_000);
    assert_eq!(config.reusable_fields, vec!["currency"]);
    // Untouched keys keep their defaults
    assert_eq!(config.batch_limit, 4);
}

#[test]
fn unknown_keys_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rowforge.toml");
    std::fs::write(&path, "worker_count = 8\n").unwrap();
    assert!(matches!(
        Config::load(Some(&path)).unwrap_err(),
        ConfigError::Parse { .. }
    ));
}

#[test]
fn missing_file_is_a_read_error() {
    let missing = std::path::Path::new("/definitely/not/here.toml");
    assert!(matches!(
        Config::load(Some(missing)).unwrap_err(),
        ConfigError::Read { .. }
    ));
}

#[test]
fn worker_config_carries_tuning() {
    let mut config = Config::default();
    config.score_threshold = 0.7;
    config.python_bin = "python3.12".to_string();
    let worker = config.worker_config();
    assert!((worker.mapper.score_threshold - 0.7).abs() < f64::EPSILON);
    assert_eq!(worker.sandbox.python_bin, "python3.12");
    assert_eq!(worker.backoff.base_ms, 5_000);
}
