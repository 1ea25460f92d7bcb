// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::run::RunId;

#[test]
fn short_truncates() {
    assert_eq!(short("abcdef", 3), "abc");
    assert_eq!(short("ab", 3), "ab");
    assert_eq!(short("", 3), "");
}

#[test]
fn generated_ids_carry_prefix_and_are_unique() {
    let a = RunId::generate();
    let b = RunId::generate();
    assert!(a.as_str().starts_with("run-"));
    assert_eq!(a.as_str().len(), "run-".len() + 19);
    assert_ne!(a, b);
}

#[test]
fn id_from_str_roundtrip() {
    let id: RunId = "run-fixed".into();
    assert_eq!(id.as_str(), "run-fixed");
    assert_eq!(id.to_string(), "run-fixed");
    assert_eq!(id, "run-fixed");
}

#[test]
fn id_serde_is_transparent() {
    let id = RunId::new("run-x1");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"run-x1\"");
    let parsed: RunId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, id);
}
