// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot plugin validation.
//!
//! Runs off the hot path, one fresh child per call. Every plugin failure
//! mode — oversize source, bad metadata, syntax error, disallowed
//! import, runtime exception, contract violation, timeout, crash — is
//! converted to a location-keyed diagnostic on the outcome. The call
//! itself only errors when the sandbox cannot operate at all (the
//! interpreter failed to spawn).

use sha2::{Digest, Sha256};

use rf_plugin::parse_manifest;

use crate::protocol::{Request, SandboxError, SandboxOptions, ValidationOutcome};
use crate::supervisor::ChildProc;

fn content_hash(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

/// Validate plugin source against its canonical key.
pub async fn validate(
    code: &str,
    canonical_key: &str,
    opts: &SandboxOptions,
) -> Result<ValidationOutcome, SandboxError> {
    let mut outcome = ValidationOutcome::new(content_hash(code));

    if code.len() > opts.max_source_bytes {
        outcome.push_error(
            "source",
            format!(
                "source is {} bytes, limit is {}",
                code.len(),
                opts.max_source_bytes
            ),
        );
        return Ok(outcome);
    }

    let (manifest, diagnostics) = parse_manifest(code, canonical_key);
    for (location, message) in diagnostics {
        outcome.push_error(location, message);
    }
    if let Some(manifest) = manifest {
        outcome.name = Some(manifest.name);
        outcome.description = Some(manifest.description);
        outcome.version = Some(manifest.version);
    }

    // Execute and contract-check in a fresh child even when metadata is
    // already bad, so the submitter sees all diagnostics in one pass.
    let mut child = ChildProc::spawn(opts)?;
    let response = child
        .request(
            &Request::Validate {
                code: code.to_string(),
            },
            opts.validate_timeout,
        )
        .await;

    match response {
        Ok(response) => {
            child.shutdown().await;
            if response.ok {
                if let Some(errors) = response.errors {
                    for (location, messages) in errors {
                        for message in messages {
                            outcome.push_error(location.clone(), message);
                        }
                    }
                }
            } else {
                let detail = response
                    .error
                    .map(|e| format!("{}: {}", e.code, e.message))
                    .unwrap_or_else(|| "driver rejected the request".to_string());
                outcome.push_error("protocol", detail);
            }
        }
        Err(SandboxError::Timeout(limit)) => {
            outcome.push_error(
                "timeout",
                format!("plugin validation exceeded {}ms", limit.as_millis()),
            );
        }
        Err(SandboxError::Closed) => {
            child.kill().await;
            outcome.push_error("crash", "sandbox process exited during validation");
        }
        Err(SandboxError::Io(io)) => {
            outcome.push_error("crash", format!("sandbox pipe failure: {io}"));
        }
        Err(error) => {
            outcome.push_error("protocol", error.to_string());
        }
    }

    outcome.success = outcome.errors.is_empty();
    tracing::debug!(
        key = canonical_key,
        success = outcome.success,
        diagnostics = outcome.errors.len(),
        "plugin validated"
    );
    Ok(outcome)
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
