// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Document extraction and output serialization.
//!
//! Input documents are CSV (the common case) or a JSON array of rows;
//! the first row is always the header row. Output is written back as
//! CSV.

use serde_json::Value;
use thiserror::Error;

use rf_core::{Table, TableError};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("document is empty")]
    Empty,

    #[error("csv parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("json document must be an array of arrays")]
    JsonShape,

    #[error(transparent)]
    Table(#[from] TableError),
}

fn cell_from_json(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Parse raw document bytes into a table.
pub fn extract_table(bytes: &[u8]) -> Result<Table, ExtractError> {
    let head = bytes
        .iter()
        .copied()
        .find(|b| !b.is_ascii_whitespace())
        .ok_or(ExtractError::Empty)?;
    if head == b'[' {
        extract_json(bytes)
    } else {
        extract_csv(bytes)
    }
}

fn extract_csv(bytes: &[u8]) -> Result<Table, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() {
        return Err(ExtractError::Empty);
    }
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(Table::new(headers, rows)?)
}

fn extract_json(bytes: &[u8]) -> Result<Table, ExtractError> {
    let value: Value = serde_json::from_slice(bytes)?;
    let rows = value.as_array().ok_or(ExtractError::JsonShape)?;
    let mut iter = rows.iter();
    let headers = iter
        .next()
        .ok_or(ExtractError::Empty)?
        .as_array()
        .ok_or(ExtractError::JsonShape)?
        .iter()
        .map(cell_from_json)
        .collect();
    let mut data = Vec::new();
    for row in iter {
        let row = row.as_array().ok_or(ExtractError::JsonShape)?;
        data.push(row.iter().map(cell_from_json).collect());
    }
    Ok(Table::new(headers, data)?)
}

/// Serialize a table as CSV bytes.
pub fn write_csv(table: &Table) -> Result<Vec<u8>, ExtractError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| ExtractError::Csv(e.into_error().into()))
}

#[cfg(test)]
#[path = "extract_tests.rs"]
mod tests;
