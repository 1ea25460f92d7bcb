// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Detector score patch validation.
//!
//! Detector output crosses the sandbox boundary as JSON; this is the
//! defensive check that turns a raw value into a `field -> delta`
//! mapping, rejecting non-numeric scores and (unless explicitly allowed)
//! unknown field names. Hook-contributed score patches pass
//! `allow_unknown = true`.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::registry::PluginRegistry;

/// A validated `field -> score delta` mapping.
pub type ScorePatch = BTreeMap<String, f64>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScoreError {
    #[error("detector output must be a mapping of field to number")]
    NotAMapping,

    #[error("score for field '{0}' is not a finite number")]
    NotANumber(String),

    #[error("score patch references unknown field '{0}'")]
    UnknownField(String),
}

/// Parse a raw JSON score mapping, checking only that values are finite
/// numbers. Field-name checks happen against a registry via
/// [`PluginRegistry::validate_detector_scores`].
pub fn parse_scores(patch: &Value) -> Result<ScorePatch, ScoreError> {
    let Some(map) = patch.as_object() else {
        return Err(ScoreError::NotAMapping);
    };
    let mut scores = ScorePatch::new();
    for (field, value) in map {
        let delta = value
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ScoreError::NotANumber(field.clone()))?;
        scores.insert(field.clone(), delta);
    }
    Ok(scores)
}

impl PluginRegistry {
    /// Check a raw score patch against the registered fields.
    pub fn validate_detector_scores(
        &self,
        patch: &Value,
        allow_unknown: bool,
    ) -> Result<ScorePatch, ScoreError> {
        let scores = parse_scores(patch)?;
        if !allow_unknown {
            for field in scores.keys() {
                if !self.has_field(field) {
                    return Err(ScoreError::UnknownField(field.clone()));
                }
            }
        }
        Ok(scores)
    }
}

#[cfg(test)]
#[path = "score_tests.rs"]
mod tests;
