// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capability invocation seam.
//!
//! The mapper and the pipeline call plugin capabilities through this
//! trait; the sandbox crate provides the real implementation backed by
//! the plugin host subprocess, and tests use scripted fakes. Plugin
//! misbehavior surfaces as `Contract`/`PluginException` values, never as
//! a panic or an escaped sandbox fault.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use rf_core::Table;

use crate::hooks::HookContext;
use crate::registry::{Detector, Transform, Validator};
use crate::score::ScorePatch;

#[derive(Debug, Error)]
pub enum InvokeError {
    /// Sandbox transport fault (spawn, pipe, timeout). Transient.
    #[error("sandbox transport failure: {0}")]
    Transport(String),

    /// Capability returned a value outside its contract. Permanent.
    #[error("{capability} '{qualname}' violated its contract: {message}")]
    Contract {
        capability: &'static str,
        qualname: String,
        message: String,
    },

    /// Plugin code raised. Permanent (a plugin defect, not a transient).
    #[error("{capability} '{qualname}' raised: {message}")]
    PluginException {
        capability: &'static str,
        qualname: String,
        message: String,
    },
}

impl InvokeError {
    /// Transport faults may heal on retry; contract violations and
    /// plugin exceptions are configuration defects and never retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, InvokeError::Transport(_))
    }
}

/// Context handed to a detector: one candidate column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectContext {
    pub field: String,
    pub header: String,
    pub values: Vec<String>,
    /// Physical column index in the source table.
    pub index: usize,
    pub sheet: String,
}

/// Context handed to a transform: one cell within its row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformContext {
    pub field: String,
    pub value: String,
    pub row: BTreeMap<String, String>,
}

/// Context handed to a validator: one cell within its row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateContext {
    pub field: String,
    pub value: String,
    pub row: BTreeMap<String, String>,
}

/// Calls plugin capabilities across the sandbox boundary.
#[async_trait]
pub trait CapabilityInvoker: Send + Sync {
    /// Run one detector; returns its `field -> score delta` patch.
    async fn detect(
        &self,
        detector: &Detector,
        ctx: &DetectContext,
    ) -> Result<ScorePatch, InvokeError>;

    /// Run one transform; returns its `field -> new value` cell patch.
    async fn transform(
        &self,
        transform: &Transform,
        ctx: &TransformContext,
    ) -> Result<BTreeMap<String, String>, InvokeError>;

    /// Run one validator; returns issue messages for the cell.
    async fn validate_cell(
        &self,
        validator: &Validator,
        ctx: &ValidateContext,
    ) -> Result<Vec<String>, InvokeError>;

    /// Run one hook. Table-returning stages may yield a replacement
    /// table; all other stages must yield `None`.
    async fn run_hook(
        &self,
        hook: &crate::registry::Hook,
        ctx: &HookContext,
    ) -> Result<Option<Table>, InvokeError>;
}
