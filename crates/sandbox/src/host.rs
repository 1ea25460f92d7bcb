// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Long-lived per-run plugin host.
//!
//! The pipeline loads a plugin once per run and then makes many
//! capability calls against the same child (detectors per column,
//! transforms and validators per row, hooks per stage). The host owns
//! that child and implements [`CapabilityInvoker`] over the call
//! protocol. Hosts are never shared between runs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use rf_core::Table;
use rf_plugin::invoke::{
    CapabilityInvoker, DetectContext, InvokeError, TransformContext, ValidateContext,
};
use rf_plugin::{parse_scores, Detector, Hook, HookContext, Registrations, ScorePatch, Transform, Validator};

use crate::protocol::{CallResult, Request, SandboxError, SandboxOptions};
use crate::supervisor::ChildProc;

/// One sandbox child serving one run's capability calls.
pub struct PluginHost {
    child: Mutex<ChildProc>,
    opts: SandboxOptions,
}

impl PluginHost {
    /// Spawn the child interpreter. No plugin code runs until `load`.
    pub fn spawn(opts: SandboxOptions) -> Result<Self, SandboxError> {
        let child = ChildProc::spawn(&opts)?;
        Ok(Self {
            child: Mutex::new(child),
            opts,
        })
    }

    /// Load plugin source and collect its registrations.
    ///
    /// Any load-time diagnostic (syntax error, disallowed import,
    /// registration ordering violation) fails the load: these are
    /// configuration defects that validation should have caught.
    pub async fn load(&self, code: &str) -> Result<Registrations, SandboxError> {
        let response = self
            .child
            .lock()
            .await
            .request(
                &Request::Load {
                    code: code.to_string(),
                },
                self.opts.call_timeout,
            )
            .await?;
        if !response.ok {
            let detail = response
                .error
                .map(|e| format!("{}: {}", e.code, e.message))
                .unwrap_or_else(|| "driver rejected load".to_string());
            return Err(SandboxError::Protocol(detail));
        }
        if let Some(errors) = &response.errors {
            if !errors.is_empty() {
                let mut parts = Vec::new();
                for (location, messages) in errors {
                    for message in messages {
                        parts.push(format!("{location}: {message}"));
                    }
                }
                return Err(SandboxError::PluginLoad(parts.join("; ")));
            }
        }
        response
            .registrations
            .ok_or_else(|| SandboxError::Protocol("load response missing registrations".to_string()))
    }

    async fn call(&self, handle: u64, ctx: Value) -> Result<CallResult, SandboxError> {
        let response = self
            .child
            .lock()
            .await
            .request(&Request::Call { handle, ctx }, self.opts.call_timeout)
            .await?;
        if !response.ok {
            let detail = response
                .error
                .map(|e| format!("{}: {}", e.code, e.message))
                .unwrap_or_else(|| "driver rejected call".to_string());
            return Err(SandboxError::Protocol(detail));
        }
        response
            .result
            .ok_or_else(|| SandboxError::Protocol("call response missing result".to_string()))
    }

    /// Returned value of a call, after unwrapping plugin exceptions.
    async fn call_value(
        &self,
        capability: &'static str,
        qualname: &str,
        handle: u64,
        ctx: Value,
    ) -> Result<Value, InvokeError> {
        let result = self
            .call(handle, ctx)
            .await
            .map_err(|e| InvokeError::Transport(e.to_string()))?;
        if let Some(error) = result.error {
            return Err(InvokeError::PluginException {
                capability,
                qualname: qualname.to_string(),
                message: error.message,
            });
        }
        Ok(result.value.unwrap_or(Value::Null))
    }

    /// Shut the child down. Dropping the host also kills the child.
    pub async fn shutdown(self) {
        self.child.into_inner().shutdown().await;
    }
}

fn contract(capability: &'static str, qualname: &str, message: impl Into<String>) -> InvokeError {
    InvokeError::Contract {
        capability,
        qualname: qualname.to_string(),
        message: message.into(),
    }
}

fn to_ctx(value: impl serde::Serialize) -> Result<Value, InvokeError> {
    serde_json::to_value(value).map_err(|e| InvokeError::Transport(e.to_string()))
}

/// Render a returned cell value as a table cell.
fn coerce_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl CapabilityInvoker for PluginHost {
    async fn detect(
        &self,
        detector: &Detector,
        ctx: &DetectContext,
    ) -> Result<ScorePatch, InvokeError> {
        let value = self
            .call_value("detector", &detector.qualname, detector.handle, to_ctx(ctx)?)
            .await?;
        let scores = value
            .get("scores")
            .ok_or_else(|| {
                contract(
                    "detector",
                    &detector.qualname,
                    "must return a mapping with a 'scores' mapping",
                )
            })?;
        parse_scores(scores).map_err(|e| contract("detector", &detector.qualname, e.to_string()))
    }

    async fn transform(
        &self,
        transform: &Transform,
        ctx: &TransformContext,
    ) -> Result<BTreeMap<String, String>, InvokeError> {
        let value = self
            .call_value(
                "transform",
                &transform.qualname,
                transform.handle,
                to_ctx(ctx)?,
            )
            .await?;
        let cells = value.get("cells").and_then(Value::as_object).ok_or_else(|| {
            contract(
                "transform",
                &transform.qualname,
                "must return a mapping with a 'cells' mapping",
            )
        })?;
        Ok(cells
            .iter()
            .map(|(field, cell)| (field.clone(), coerce_cell(cell)))
            .collect())
    }

    async fn validate_cell(
        &self,
        validator: &Validator,
        ctx: &ValidateContext,
    ) -> Result<Vec<String>, InvokeError> {
        let value = self
            .call_value(
                "validator",
                &validator.qualname,
                validator.handle,
                to_ctx(ctx)?,
            )
            .await?;
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Object(map) => {
                let errors = map.get("errors").and_then(Value::as_array).ok_or_else(|| {
                    contract(
                        "validator",
                        &validator.qualname,
                        "must return nothing or a mapping with an 'errors' list",
                    )
                })?;
                Ok(errors.iter().map(coerce_cell).collect())
            }
            _ => Err(contract(
                "validator",
                &validator.qualname,
                "must return nothing or a mapping with an 'errors' list",
            )),
        }
    }

    async fn run_hook(&self, hook: &Hook, ctx: &HookContext) -> Result<Option<Table>, InvokeError> {
        let value = self
            .call_value("hook", &hook.qualname, hook.handle, to_ctx(ctx)?)
            .await?;
        if ctx.stage().returns_table() {
            match value {
                Value::Null => Ok(None),
                table => serde_json::from_value::<Table>(table).map(Some).map_err(|e| {
                    contract(
                        "hook",
                        &hook.qualname,
                        format!("returned value is not a table: {e}"),
                    )
                }),
            }
        } else {
            match value {
                Value::Null => Ok(None),
                _ => Err(contract(
                    "hook",
                    &hook.qualname,
                    format!("hooks for stage '{}' must return nothing", ctx.stage()),
                )),
            }
        }
    }
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
