// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rf_core::Phase;

#[test]
fn error_display_tags_the_stage() {
    let err = PipelineError::pipeline(Phase::Transform, "boom", true);
    assert_eq!(err.to_string(), "stage=transform: boom");

    let err = PipelineError::cancelled(Phase::Map);
    assert_eq!(err.to_string(), "stage=map: run cancelled");
}

#[yare::parameterized(
    config = { PipelineError::config(Phase::LoadConfig, "bad manifest"), false },
    input = { PipelineError::input(Phase::Extract, "missing doc"), true },
    hook = { PipelineError::hook(Phase::Map, "returned junk"), false },
    transient = { PipelineError::pipeline(Phase::Map, "pipe broke", false), true },
    permanent = { PipelineError::pipeline(Phase::Transform, "contract", true), false },
    cancelled = { PipelineError::cancelled(Phase::Validate), false },
)]
fn retry_policy(err: PipelineError, retryable: bool) {
    assert_eq!(err.is_retryable(), retryable);
}

#[test]
fn invoke_errors_classify_by_transience() {
    let transport = InvokeError::Transport("pipe".to_string());
    let err = PipelineError::from_invoke(Phase::Map, transport);
    assert!(err.is_retryable());

    let contract = InvokeError::Contract {
        capability: "detector",
        qualname: "detect_x".to_string(),
        message: "no scores".to_string(),
    };
    let err = PipelineError::from_invoke(Phase::Map, contract);
    assert!(!err.is_retryable());
}

#[test]
fn hook_invoke_errors_become_hook_kind() {
    let contract = InvokeError::Contract {
        capability: "hook",
        qualname: "h".to_string(),
        message: "returned a value".to_string(),
    };
    let err = PipelineError::from_hook_invoke(Phase::Map, contract);
    assert!(matches!(err.kind, PipelineErrorKind::Hook(_)));
    assert!(!err.is_retryable());

    let transport = InvokeError::Transport("pipe".to_string());
    let err = PipelineError::from_hook_invoke(Phase::Map, transport);
    assert!(err.is_retryable());
}

#[test]
fn cancelled_is_detected() {
    assert!(PipelineError::cancelled(Phase::Write).is_cancelled());
    assert!(!PipelineError::input(Phase::Write, "x").is_cancelled());
}
