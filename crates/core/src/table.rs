// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-flight table model.
//!
//! A table is one header row plus string-valued data rows. Tables are
//! recomputed per document and never persisted beyond a run's lifetime,
//! so the representation stays deliberately plain.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("row {row} has {got} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        got: usize,
        expected: usize,
    },
    #[error("column index {0} out of bounds")]
    ColumnOutOfBounds(usize),
}

/// A rectangular table of string cells with a header row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table, checking every row matches the header width.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, TableError> {
        let expected = headers.len();
        for (i, row) in rows.iter().enumerate() {
            if row.len() != expected {
                return Err(TableError::RaggedRow {
                    row: i,
                    got: row.len(),
                    expected,
                });
            }
        }
        Ok(Self { headers, rows })
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All values of one column, top to bottom.
    pub fn column_values(&self, index: usize) -> Result<Vec<String>, TableError> {
        if index >= self.headers.len() {
            return Err(TableError::ColumnOutOfBounds(index));
        }
        Ok(self.rows.iter().map(|r| r[index].clone()).collect())
    }

    /// Header text for one column.
    pub fn header(&self, index: usize) -> Result<&str, TableError> {
        self.headers
            .get(index)
            .map(String::as_str)
            .ok_or(TableError::ColumnOutOfBounds(index))
    }
}

#[cfg(test)]
#[path = "table_tests.rs"]
mod tests;
