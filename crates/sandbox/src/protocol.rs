// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sandbox wire types and options.
//!
//! Wire format: one JSON object per line on the child's stdin/stdout.
//! Requests are tagged by `op`; responses carry `ok` plus an op-specific
//! payload. A `false` ok means the driver could not process the request
//! at all (protocol fault); plugin misbehavior always comes back inside
//! an ok response.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use rf_plugin::Registrations;

/// Transport-level sandbox failure. Plugin misbehavior is never an
/// error: it is reported as diagnostics or in-band call results.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to spawn sandbox interpreter: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("sandbox io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sandbox protocol error: {0}")]
    Protocol(String),

    #[error("sandbox call timed out after {0:?}")]
    Timeout(Duration),

    #[error("sandbox process exited unexpectedly")]
    Closed,

    #[error("plugin failed to load: {0}")]
    PluginLoad(String),
}

/// Sandbox tuning knobs.
#[derive(Debug, Clone)]
pub struct SandboxOptions {
    /// Interpreter binary; resolved from `PATH` when not absolute.
    pub python_bin: String,
    /// Hard wall-clock limit for one-shot validation.
    pub validate_timeout: Duration,
    /// Wall-clock limit for a single capability call in the plugin host.
    pub call_timeout: Duration,
    /// Maximum plugin source size in bytes.
    pub max_source_bytes: usize,
    /// Address-space limit applied inside the child, when set.
    pub memory_limit_bytes: Option<u64>,
}

impl Default for SandboxOptions {
    fn default() -> Self {
        Self {
            python_bin: "python3".to_string(),
            validate_timeout: Duration::from_secs(5),
            call_timeout: Duration::from_secs(30),
            max_source_bytes: 32 * 1024,
            memory_limit_bytes: Some(512 * 1024 * 1024),
        }
    }
}

/// Parent-to-child request.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Validate { code: String },
    Load { code: String },
    Call { handle: u64, ctx: Value },
    Shutdown,
}

/// Driver-level failure detail.
#[derive(Debug, Clone, Deserialize)]
pub struct WireError {
    pub code: String,
    pub message: String,
}

/// Result payload of a `call` request. Exactly one of `value`/`error`
/// is set: `error` carries a plugin exception, `value` the return value
/// (JSON `null` when the capability returned nothing).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallResult {
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub error: Option<WireError>,
}

/// Child-to-parent response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<WireError>,
    /// Diagnostics keyed by location (`validate`/`load`).
    #[serde(default)]
    pub errors: Option<BTreeMap<String, Vec<String>>>,
    #[serde(default)]
    pub registrations: Option<Registrations>,
    #[serde(default)]
    pub result: Option<CallResult>,
}

/// Outcome of one-shot plugin validation.
///
/// Validation never fails hard on plugin misbehavior: every failure mode
/// lands in `errors`, keyed by location (`docstring.version`, `import`,
/// a detector's qualname, `timeout`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub success: bool,
    /// Hex sha256 of the validated source.
    pub content_hash: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ValidationOutcome {
    pub(crate) fn new(content_hash: String) -> Self {
        Self {
            success: false,
            content_hash,
            name: None,
            description: None,
            version: None,
            errors: BTreeMap::new(),
        }
    }

    pub(crate) fn push_error(&mut self, location: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(location.into())
            .or_default()
            .push(message.into());
    }

    /// Messages recorded under one location key.
    pub fn errors_at(&self, location: &str) -> &[String] {
        self.errors.get(location).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
