// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted invoker for other crates' tests.
//!
//! Each capability kind is backed by a closure; defaults are inert
//! (empty score patches, no cell patches, no issues, no table
//! replacement), so tests only script the calls they care about.

use std::collections::BTreeMap;

use async_trait::async_trait;

use rf_core::Table;

use crate::hooks::HookContext;
use crate::invoke::{
    CapabilityInvoker, DetectContext, InvokeError, TransformContext, ValidateContext,
};
use crate::registry::{Detector, Hook, Transform, Validator};
use crate::score::ScorePatch;

type DetectFn = dyn Fn(&Detector, &DetectContext) -> Result<ScorePatch, InvokeError> + Send + Sync;
type TransformFn = dyn Fn(&Transform, &TransformContext) -> Result<BTreeMap<String, String>, InvokeError>
    + Send
    + Sync;
type ValidateFn =
    dyn Fn(&Validator, &ValidateContext) -> Result<Vec<String>, InvokeError> + Send + Sync;
type HookFn = dyn Fn(&Hook, &HookContext) -> Result<Option<Table>, InvokeError> + Send + Sync;

pub struct FakeInvoker {
    detect: Box<DetectFn>,
    transform: Box<TransformFn>,
    validate: Box<ValidateFn>,
    hook: Box<HookFn>,
}

impl Default for FakeInvoker {
    fn default() -> Self {
        Self {
            detect: Box::new(|_, _| Ok(ScorePatch::new())),
            transform: Box::new(|_, _| Ok(BTreeMap::new())),
            validate: Box::new(|_, _| Ok(Vec::new())),
            hook: Box::new(|_, _| Ok(None)),
        }
    }
}

impl FakeInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_detect<F>(mut self, f: F) -> Self
    where
        F: Fn(&Detector, &DetectContext) -> Result<ScorePatch, InvokeError>
            + Send
            + Sync
            + 'static,
    {
        self.detect = Box::new(f);
        self
    }

    pub fn with_transform<F>(mut self, f: F) -> Self
    where
        F: Fn(&Transform, &TransformContext) -> Result<BTreeMap<String, String>, InvokeError>
            + Send
            + Sync
            + 'static,
    {
        self.transform = Box::new(f);
        self
    }

    pub fn with_validate<F>(mut self, f: F) -> Self
    where
        F: Fn(&Validator, &ValidateContext) -> Result<Vec<String>, InvokeError>
            + Send
            + Sync
            + 'static,
    {
        self.validate = Box::new(f);
        self
    }

    pub fn with_hook<F>(mut self, f: F) -> Self
    where
        F: Fn(&Hook, &HookContext) -> Result<Option<Table>, InvokeError> + Send + Sync + 'static,
    {
        self.hook = Box::new(f);
        self
    }
}

#[async_trait]
impl CapabilityInvoker for FakeInvoker {
    async fn detect(
        &self,
        detector: &Detector,
        ctx: &DetectContext,
    ) -> Result<ScorePatch, InvokeError> {
        (self.detect)(detector, ctx)
    }

    async fn transform(
        &self,
        transform: &Transform,
        ctx: &TransformContext,
    ) -> Result<BTreeMap<String, String>, InvokeError> {
        (self.transform)(transform, ctx)
    }

    async fn validate_cell(
        &self,
        validator: &Validator,
        ctx: &ValidateContext,
    ) -> Result<Vec<String>, InvokeError> {
        (self.validate)(validator, ctx)
    }

    async fn run_hook(&self, hook: &Hook, ctx: &HookContext) -> Result<Option<Table>, InvokeError> {
        (self.hook)(hook, ctx)
    }
}
