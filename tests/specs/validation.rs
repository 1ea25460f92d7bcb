// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sandbox validation specs against real plugin source.

use rf_sandbox::{validate, SandboxOptions};

const VALID: &str = r#"
"""
name: acme-invoices
description: Normalizes ACME invoice exports
version: 1.2.0
"""
import re

def register(registry):
    registry.field("amount", required=True)

    @registry.detector("amount", priority=10)
    def detect_amount(column):
        score = 0.9 if re.search(r"amount", column["header"], re.I) else 0.0
        return {"scores": {"amount": score}}
"#;

#[tokio::test]
async fn valid_plugin_reports_metadata_and_hash() {
    let outcome = validate(VALID, "acme-invoices", &SandboxOptions::default())
        .await
        .unwrap();
    assert!(outcome.success, "diagnostics: {:?}", outcome.errors);
    assert_eq!(outcome.name.as_deref(), Some("acme-invoices"));
    assert_eq!(outcome.description.as_deref(), Some("Normalizes ACME invoice exports"));
    assert_eq!(outcome.version.as_deref(), Some("1.2.0"));
    assert!(outcome.content_hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn network_imports_are_denied() {
    let source = VALID.replace("import re", "import socket");
    let outcome = validate(&source, "acme-invoices", &SandboxOptions::default())
        .await
        .unwrap();
    assert!(!outcome.success);
    assert!(outcome.errors_at("import")[0].contains("socket"));
}

#[tokio::test]
async fn metadata_gaps_are_keyed_diagnostics() {
    let source = VALID.replace("version: 1.2.0\n", "");
    let outcome = validate(&source, "acme-invoices", &SandboxOptions::default())
        .await
        .unwrap();
    assert!(!outcome.success);
    assert!(!outcome.errors_at("docstring.version").is_empty());
}

#[tokio::test]
async fn name_mismatch_is_rejected() {
    let outcome = validate(VALID, "someone-elses-key", &SandboxOptions::default())
        .await
        .unwrap();
    assert!(!outcome.success);
    assert!(outcome.errors_at("docstring.name")[0].contains("does not match"));
}
