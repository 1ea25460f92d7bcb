// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manual mapping overrides.
//!
//! After reviewing an automatic mapping, a submitter may re-assign
//! specific fields to specific columns, rename passthrough columns, or
//! drop them. Patch application validates bounds and uniqueness and
//! yields a fresh mapping to recompute output headers and rows from.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use rf_core::Table;

use crate::mapping::{MapperConfig, MapperError, TableMapping};

/// A manual override patch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingPatch {
    /// Field re-assignments; `None` unmaps the field.
    #[serde(default)]
    pub assign: BTreeMap<String, Option<usize>>,
    /// Passthrough renames, keyed by source column.
    #[serde(default)]
    pub rename_passthrough: BTreeMap<usize, String>,
    /// Passthrough columns to drop from the output.
    #[serde(default)]
    pub drop_passthrough: Vec<usize>,
}

impl MappingPatch {
    pub fn is_empty(&self) -> bool {
        self.assign.is_empty()
            && self.rename_passthrough.is_empty()
            && self.drop_passthrough.is_empty()
    }

    /// Apply the patch to a mapping, validating against the table.
    pub fn apply(
        &self,
        mapping: &TableMapping,
        table: &Table,
        config: &MapperConfig,
    ) -> Result<TableMapping, MapperError> {
        let mut patched = mapping.clone();

        for (field, column) in &self.assign {
            let entry = patched
                .fields
                .iter_mut()
                .find(|f| &f.field == field)
                .ok_or_else(|| MapperError::UnknownField(field.clone()))?;
            if let Some(column) = column {
                if *column >= table.column_count() {
                    return Err(MapperError::ColumnOutOfBounds(*column));
                }
            }
            entry.column = *column;
        }

        // No two fields may claim the same column; fields on the
        // reusable allow-list may share.
        let mut seen: HashSet<usize> = HashSet::new();
        for field in &patched.fields {
            let Some(column) = field.column else { continue };
            if config.reusable_fields.iter().any(|f| f == &field.field) {
                continue;
            }
            if !seen.insert(column) {
                return Err(MapperError::DuplicateColumn(column));
            }
        }

        for (column, name) in &self.rename_passthrough {
            let entry = patched
                .passthrough
                .iter_mut()
                .find(|p| p.column == *column)
                .ok_or(MapperError::UnknownPassthrough(*column))?;
            entry.output_name = name.clone();
        }

        for column in &self.drop_passthrough {
            if !patched.passthrough.iter().any(|p| p.column == *column) {
                return Err(MapperError::UnknownPassthrough(*column));
            }
            patched.passthrough.retain(|p| p.column != *column);
        }

        // A column newly claimed by a field stops passing through.
        let claimed: HashSet<usize> = patched.fields.iter().filter_map(|f| f.column).collect();
        patched.passthrough.retain(|p| !claimed.contains(&p.column));

        Ok(patched)
    }
}

#[cfg(test)]
#[path = "patch_tests.rs"]
mod tests;
