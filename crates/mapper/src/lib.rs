// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rf-mapper: deterministic column-to-field assignment.
//!
//! For each document table, every registered detector scores every
//! candidate column; accumulated scores drive a greedy assignment in
//! field declaration order with a fixed threshold, lowest-column-index
//! tie-breaks, and an allow-list of fields that may share a column.
//! Unmapped fields are reported, never an error. Manual override
//! patches re-assign fields and rename or drop passthrough columns,
//! then the output table is recomputed from the patched mapping.

pub mod mapping;
pub mod patch;

pub use mapping::{
    map_table, ColumnCandidate, MappedField, MapperConfig, MapperError, PassthroughField,
    TableMapping,
};
pub use patch::MappingPatch;
