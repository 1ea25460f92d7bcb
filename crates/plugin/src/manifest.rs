// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin metadata parsed from the leading doc-comment block.
//!
//! A plugin's source must open with a module docstring carrying
//! `name`, `description` and `version` entries, one per line:
//!
//! ```text
//! """
//! name: acme-invoices
//! description: Normalizes ACME invoice exports
//! version: 1.2.0
//! """
//! ```
//!
//! Parsing never fails hard; missing or mismatched entries come back as
//! `(location, message)` diagnostics keyed `docstring.<entry>`, matching
//! the sandbox's diagnostic map.

use serde::{Deserialize, Serialize};

/// Complete, validated plugin metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub description: String,
    pub version: String,
}

/// Extract the raw text of the leading docstring, if present.
///
/// Blank lines and `#` comment lines before the docstring are ignored;
/// both `"""` and `'''` delimiters are accepted.
pub fn parse_docstring(source: &str) -> Option<String> {
    let mut rest = source;
    loop {
        let trimmed = rest.trim_start_matches([' ', '\t', '\r', '\n']);
        if let Some(after) = trimmed.strip_prefix('#') {
            rest = match after.find('\n') {
                Some(i) => &after[i + 1..],
                None => return None,
            };
            continue;
        }
        rest = trimmed;
        break;
    }
    let delim = if rest.starts_with("\"\"\"") {
        "\"\"\""
    } else if rest.starts_with("'''") {
        "'''"
    } else {
        return None;
    };
    let body = &rest[delim.len()..];
    let end = body.find(delim)?;
    Some(body[..end].to_string())
}

fn docstring_entry(docstring: &str, key: &str) -> Option<String> {
    for line in docstring.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix(key) {
            if let Some(value) = value.trim_start().strip_prefix(':') {
                let value = value.trim();
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// Parse and check plugin metadata against the plugin's canonical key.
///
/// Returns the manifest when complete and matching, plus any diagnostics
/// gathered along the way (the manifest is `None` whenever diagnostics
/// are non-empty).
pub fn parse_manifest(
    source: &str,
    canonical_key: &str,
) -> (Option<Manifest>, Vec<(String, String)>) {
    let mut diagnostics = Vec::new();

    let Some(docstring) = parse_docstring(source) else {
        diagnostics.push((
            "docstring".to_string(),
            "plugin source has no leading docstring".to_string(),
        ));
        return (None, diagnostics);
    };

    let name = docstring_entry(&docstring, "name");
    let description = docstring_entry(&docstring, "description");
    let version = docstring_entry(&docstring, "version");

    for (key, value) in [
        ("name", &name),
        ("description", &description),
        ("version", &version),
    ] {
        if value.is_none() {
            diagnostics.push((
                format!("docstring.{key}"),
                format!("docstring is missing a '{key}' entry"),
            ));
        }
    }

    if let Some(name) = &name {
        if name != canonical_key {
            diagnostics.push((
                "docstring.name".to_string(),
                format!("plugin name '{name}' does not match '{canonical_key}'"),
            ));
        }
    }

    if !diagnostics.is_empty() {
        return (None, diagnostics);
    }

    // All three entries are present and the name matched.
    match (name, description, version) {
        (Some(name), Some(description), Some(version)) => (
            Some(Manifest {
                name,
                description,
                version,
            }),
            diagnostics,
        ),
        _ => (None, diagnostics),
    }
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
