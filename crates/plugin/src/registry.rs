// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed capability records and the finalized registry.
//!
//! The sandbox driver records the plugin's registration calls in order
//! and reports them as the DTOs below; `PluginRegistry::from_registrations`
//! checks them and freezes the execution order. Ordering is by
//! `(priority desc, registration index asc)` — the handle doubles as the
//! stable registration index, so ties between equal priorities resolve
//! to source registration order.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hooks::HookStage;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("duplicate field registration: {0}")]
    DuplicateField(String),

    #[error("{capability} '{qualname}' references unknown field '{field}'")]
    UnknownField {
        capability: &'static str,
        qualname: String,
        field: String,
    },

    #[error("hook '{qualname}' has unknown stage '{stage}'")]
    UnknownStage { qualname: String, stage: String },
}

/// A canonical target field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(default)]
    pub required: bool,
}

/// A detector: scores how likely a column corresponds to a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detector {
    /// Call handle in the plugin host; doubles as registration index.
    pub handle: u64,
    pub field: String,
    #[serde(default)]
    pub priority: i32,
    pub module: String,
    pub qualname: String,
}

/// A transform: rewrites cells of its field, row by row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transform {
    pub handle: u64,
    pub field: String,
    #[serde(default)]
    pub priority: i32,
    pub module: String,
    pub qualname: String,
}

/// A validator: reports per-cell issues for its field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub handle: u64,
    pub field: String,
    #[serde(default)]
    pub priority: i32,
    pub module: String,
    pub qualname: String,
}

/// A hook attached to one pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hook {
    pub handle: u64,
    pub stage: String,
    #[serde(default)]
    pub priority: i32,
    pub module: String,
    pub qualname: String,
}

/// Raw registration list reported by the sandbox driver, in call order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Registrations {
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub detectors: Vec<Detector>,
    #[serde(default)]
    pub transforms: Vec<Transform>,
    #[serde(default)]
    pub validators: Vec<Validator>,
    #[serde(default)]
    pub hooks: Vec<Hook>,
    /// True when the plugin opts into carrying unmapped columns through.
    #[serde(default)]
    pub carry_passthrough: bool,
}

/// Execution order: priority descending, then registration order.
fn sort_key(priority: i32, handle: u64) -> (i64, u64) {
    (-i64::from(priority), handle)
}

/// Finalized, immutable plugin catalog.
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    fields: IndexMap<String, FieldDef>,
    detectors: BTreeMap<String, Vec<Detector>>,
    transforms: BTreeMap<String, Vec<Transform>>,
    validators: BTreeMap<String, Vec<Validator>>,
    hooks: BTreeMap<HookStage, Vec<Hook>>,
    carry_passthrough: bool,
}

impl PluginRegistry {
    /// Check raw registrations and freeze execution order.
    ///
    /// The driver enforces call ordering inside the child (fields before
    /// the capabilities that reference them); this re-checks the result
    /// defensively, so a buggy or malicious child cannot smuggle records
    /// past the contract.
    pub fn from_registrations(regs: Registrations) -> Result<Self, RegistryError> {
        let mut fields: IndexMap<String, FieldDef> = IndexMap::new();
        for field in regs.fields {
            if fields.contains_key(&field.name) {
                return Err(RegistryError::DuplicateField(field.name));
            }
            fields.insert(field.name.clone(), field);
        }

        let mut detectors: BTreeMap<String, Vec<Detector>> = BTreeMap::new();
        for det in regs.detectors {
            if !fields.contains_key(&det.field) {
                return Err(RegistryError::UnknownField {
                    capability: "detector",
                    qualname: det.qualname,
                    field: det.field,
                });
            }
            detectors.entry(det.field.clone()).or_default().push(det);
        }
        for list in detectors.values_mut() {
            list.sort_by_key(|d| sort_key(d.priority, d.handle));
        }

        let mut transforms: BTreeMap<String, Vec<Transform>> = BTreeMap::new();
        for t in regs.transforms {
            if !fields.contains_key(&t.field) {
                return Err(RegistryError::UnknownField {
                    capability: "transform",
                    qualname: t.qualname,
                    field: t.field,
                });
            }
            transforms.entry(t.field.clone()).or_default().push(t);
        }
        for list in transforms.values_mut() {
            list.sort_by_key(|t| sort_key(t.priority, t.handle));
        }

        let mut validators: BTreeMap<String, Vec<Validator>> = BTreeMap::new();
        for v in regs.validators {
            if !fields.contains_key(&v.field) {
                return Err(RegistryError::UnknownField {
                    capability: "validator",
                    qualname: v.qualname,
                    field: v.field,
                });
            }
            validators.entry(v.field.clone()).or_default().push(v);
        }
        for list in validators.values_mut() {
            list.sort_by_key(|v| sort_key(v.priority, v.handle));
        }

        let mut hooks: BTreeMap<HookStage, Vec<Hook>> = BTreeMap::new();
        for hook in regs.hooks {
            let Some(stage) = HookStage::parse(&hook.stage) else {
                return Err(RegistryError::UnknownStage {
                    qualname: hook.qualname,
                    stage: hook.stage,
                });
            };
            hooks.entry(stage).or_default().push(hook);
        }
        for list in hooks.values_mut() {
            list.sort_by_key(|h| sort_key(h.priority, h.handle));
        }

        Ok(Self {
            fields,
            detectors,
            transforms,
            validators,
            hooks,
            carry_passthrough: regs.carry_passthrough,
        })
    }

    /// Registered fields, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.values()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Detectors for one field, highest priority first.
    pub fn detectors_for(&self, field: &str) -> &[Detector] {
        self.detectors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn transforms_for(&self, field: &str) -> &[Transform] {
        self.transforms.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn validators_for(&self, field: &str) -> &[Validator] {
        self.validators.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Hooks for one stage, highest priority first.
    pub fn hooks_for(&self, stage: HookStage) -> &[Hook] {
        self.hooks.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn carry_passthrough(&self) -> bool {
        self.carry_passthrough
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
