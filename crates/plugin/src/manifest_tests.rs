// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const GOOD: &str = r#"
"""
name: acme-invoices
description: Normalizes ACME invoice exports
version: 1.2.0
"""

def register(registry):
    pass
"#;

#[test]
fn parses_complete_manifest() {
    let (manifest, diagnostics) = parse_manifest(GOOD, "acme-invoices");
    assert!(diagnostics.is_empty());
    let manifest = manifest.unwrap();
    assert_eq!(manifest.name, "acme-invoices");
    assert_eq!(manifest.description, "Normalizes ACME invoice exports");
    assert_eq!(manifest.version, "1.2.0");
}

#[test]
fn docstring_after_comments_and_blank_lines() {
    let source = "# coding: utf-8\n\n# vendored\n'''\nname: x\n'''\n";
    assert_eq!(parse_docstring(source).unwrap().trim(), "name: x");
}

#[test]
fn missing_docstring_is_diagnosed() {
    let (manifest, diagnostics) = parse_manifest("def register(r): pass\n", "x");
    assert!(manifest.is_none());
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].0, "docstring");
}

#[test]
fn missing_version_is_diagnosed_under_docstring_version() {
    let source = "\"\"\"\nname: x\ndescription: d\n\"\"\"\n";
    let (manifest, diagnostics) = parse_manifest(source, "x");
    assert!(manifest.is_none());
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].0, "docstring.version");
}

#[test]
fn name_mismatch_is_diagnosed() {
    let (manifest, diagnostics) = parse_manifest(GOOD, "other-key");
    assert!(manifest.is_none());
    assert!(diagnostics
        .iter()
        .any(|(loc, msg)| loc == "docstring.name" && msg.contains("does not match")));
}

#[test]
fn unterminated_docstring_reads_as_missing() {
    let source = "\"\"\"\nname: x\n";
    assert!(parse_docstring(source).is_none());
}

#[test]
fn empty_value_counts_as_missing() {
    let source = "\"\"\"\nname: x\ndescription: d\nversion:\n\"\"\"\n";
    let (_, diagnostics) = parse_manifest(source, "x");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].0, "docstring.version");
}
