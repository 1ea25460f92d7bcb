// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue error type.
//!
//! Claim conflicts and lease expiry are outcomes, not errors: a
//! contended claim returns zero rows and an expired lease is recovered
//! by the sweep. `QueueError` covers storage faults only.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("run {id} has corrupt column {column}: {value}")]
    CorruptRow {
        id: String,
        column: &'static str,
        value: String,
    },
}

pub type Result<T> = std::result::Result<T, QueueError>;
