// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rf-plugin: the in-memory plugin catalog.
//!
//! A plugin registers fields and capabilities through its single
//! entrypoint; the sandbox reports those registrations as typed records
//! and this crate turns them into an ordered, immutable registry with
//! deterministic execution order.

#[cfg(any(test, feature = "test-support"))]
pub mod fake;
pub mod hooks;
pub mod invoke;
pub mod manifest;
pub mod registry;
pub mod score;

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeInvoker;

pub use hooks::{HookContext, HookRunSummary, HookStage};
pub use invoke::{
    CapabilityInvoker, DetectContext, InvokeError, TransformContext, ValidateContext,
};
pub use manifest::{parse_docstring, parse_manifest, Manifest};
pub use registry::{
    Detector, FieldDef, Hook, PluginRegistry, Registrations, RegistryError, Transform, Validator,
};
pub use score::{parse_scores, ScoreError, ScorePatch};
