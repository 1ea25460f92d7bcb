// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Score accumulation and column assignment.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use rf_core::{Table, TableError};
use rf_plugin::invoke::{CapabilityInvoker, DetectContext, InvokeError};
use rf_plugin::{PluginRegistry, ScoreError};

#[derive(Debug, Error)]
pub enum MapperError {
    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error("detector score rejected: {0}")]
    Score(#[from] ScoreError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error("field '{0}' is not part of the mapping")]
    UnknownField(String),

    #[error("column {0} is out of bounds")]
    ColumnOutOfBounds(usize),

    #[error("column {0} is claimed by more than one field")]
    DuplicateColumn(usize),

    #[error("column {0} is not a passthrough column")]
    UnknownPassthrough(usize),
}

/// Mapper tuning knobs. The defaults mirror the long-standing constants;
/// they are configurable rather than semantic choices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapperConfig {
    /// Minimum accumulated score for a column to qualify.
    pub score_threshold: f64,
    /// Fields allowed to share a column with other fields.
    pub reusable_fields: Vec<String>,
    /// Prefix for auto-generated passthrough column names.
    pub passthrough_prefix: String,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.5,
            reusable_fields: Vec::new(),
            passthrough_prefix: "column_".to_string(),
        }
    }
}

/// One physical column offered to detectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnCandidate {
    pub index: usize,
    pub header: String,
    pub values: Vec<String>,
}

impl ColumnCandidate {
    /// One candidate per physical column.
    pub fn from_table(table: &Table) -> Result<Vec<Self>, TableError> {
        (0..table.column_count())
            .map(|index| {
                Ok(Self {
                    index,
                    header: table.header(index)?.to_string(),
                    values: table.column_values(index)?,
                })
            })
            .collect()
    }
}

/// Assignment result for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedField {
    pub field: String,
    /// Source column, or `None` when no candidate qualified.
    pub column: Option<usize>,
    pub score: f64,
}

/// An unmapped column carried through to output verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassthroughField {
    pub column: usize,
    pub output_name: String,
}

/// Complete mapping for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMapping {
    /// One entry per registered field, in declaration order.
    pub fields: Vec<MappedField>,
    pub passthrough: Vec<PassthroughField>,
}

impl TableMapping {
    pub fn mapped_count(&self) -> usize {
        self.fields.iter().filter(|f| f.column.is_some()).count()
    }

    pub fn unmapped_count(&self) -> usize {
        self.fields.len() - self.mapped_count()
    }

    /// Output headers: mapped fields in declaration order, then
    /// passthrough columns.
    pub fn output_headers(&self) -> Vec<String> {
        let mut headers: Vec<String> = self
            .fields
            .iter()
            .filter(|f| f.column.is_some())
            .map(|f| f.field.clone())
            .collect();
        headers.extend(self.passthrough.iter().map(|p| p.output_name.clone()));
        headers
    }

    /// Source column index for each output column, in output order.
    fn output_columns(&self) -> Vec<usize> {
        let mut columns: Vec<usize> = self.fields.iter().filter_map(|f| f.column).collect();
        columns.extend(self.passthrough.iter().map(|p| p.column));
        columns
    }

    /// Project the source table through this mapping.
    pub fn apply(&self, table: &Table) -> Result<Table, MapperError> {
        let columns = self.output_columns();
        for &column in &columns {
            if column >= table.column_count() {
                return Err(MapperError::ColumnOutOfBounds(column));
            }
        }
        let rows = table
            .rows
            .iter()
            .map(|row| columns.iter().map(|&c| row[c].clone()).collect())
            .collect();
        Table::new(self.output_headers(), rows).map_err(MapperError::from)
    }

    /// Mapped source column of one field, if any.
    pub fn column_of(&self, field: &str) -> Option<usize> {
        self.fields
            .iter()
            .find(|f| f.field == field)
            .and_then(|f| f.column)
    }
}

/// Score every candidate column against every registered field and
/// assign at most one column per field.
pub async fn map_table(
    table: &Table,
    sheet: &str,
    registry: &PluginRegistry,
    invoker: &dyn CapabilityInvoker,
    config: &MapperConfig,
) -> Result<TableMapping, MapperError> {
    let candidates = ColumnCandidate::from_table(table)?;

    // Accumulate score deltas per (field, column). Detectors may score
    // several fields at once; deltas sum rather than overwrite.
    let mut scores: BTreeMap<(String, usize), f64> = BTreeMap::new();
    for field in registry.fields() {
        for detector in registry.detectors_for(&field.name) {
            for candidate in &candidates {
                let ctx = DetectContext {
                    field: field.name.clone(),
                    header: candidate.header.clone(),
                    values: candidate.values.clone(),
                    index: candidate.index,
                    sheet: sheet.to_string(),
                };
                let patch = invoker.detect(detector, &ctx).await?;
                for (scored_field, delta) in patch {
                    if !registry.has_field(&scored_field) {
                        return Err(MapperError::Score(ScoreError::UnknownField(scored_field)));
                    }
                    *scores
                        .entry((scored_field, candidate.index))
                        .or_insert(0.0) += delta;
                }
            }
        }
    }

    // Greedy assignment in field declaration order: best score wins,
    // ties to the lowest column index, columns consumed unless the
    // field may share.
    let mut claimed: HashSet<usize> = HashSet::new();
    let mut fields = Vec::new();
    for field in registry.fields() {
        let reusable = config.reusable_fields.iter().any(|f| f == &field.name);
        let mut best: Option<(usize, f64)> = None;
        for candidate in &candidates {
            if !reusable && claimed.contains(&candidate.index) {
                continue;
            }
            let score = scores
                .get(&(field.name.clone(), candidate.index))
                .copied()
                .unwrap_or(0.0);
            if score < config.score_threshold {
                continue;
            }
            let better = match best {
                None => true,
                // Strictly-greater keeps the lowest index on ties.
                Some((_, best_score)) => score > best_score,
            };
            if better {
                best = Some((candidate.index, score));
            }
        }
        match best {
            Some((column, score)) => {
                claimed.insert(column);
                fields.push(MappedField {
                    field: field.name.clone(),
                    column: Some(column),
                    score,
                });
            }
            None => {
                tracing::debug!(field = %field.name, "no qualifying candidate column");
                fields.push(MappedField {
                    field: field.name.clone(),
                    column: None,
                    score: 0.0,
                });
            }
        }
    }

    // Remaining unused columns pass through only when the plugin opts in.
    let passthrough = if registry.carry_passthrough() {
        candidates
            .iter()
            .filter(|c| !claimed.contains(&c.index))
            .map(|c| PassthroughField {
                column: c.index,
                output_name: format!("{}{}", config.passthrough_prefix, c.index + 1),
            })
            .collect()
    } else {
        Vec::new()
    };

    Ok(TableMapping {
        fields,
        passthrough,
    })
}

#[cfg(test)]
#[path = "mapping_tests.rs"]
mod tests;
