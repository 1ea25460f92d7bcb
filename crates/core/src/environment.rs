// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution environment records.
//!
//! An environment is shared by every run with the same
//! `(workspace, configuration, deps digest)` key and is built at most
//! once per digest, under an advisory lock held by the building worker.

use serde::{Deserialize, Serialize};

/// Composite key identifying an execution environment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvKey {
    pub workspace_id: String,
    pub config_id: String,
    pub deps_digest: String,
}

impl EnvKey {
    pub fn new(
        workspace_id: impl Into<String>,
        config_id: impl Into<String>,
        deps_digest: impl Into<String>,
    ) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            config_id: config_id.into(),
            deps_digest: deps_digest.into(),
        }
    }

    /// Name of the advisory lock guarding this environment's build.
    pub fn lock_name(&self) -> String {
        format!("env:{}", self.deps_digest)
    }
}

/// Build status of an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvStatus {
    Queued,
    Building,
    Ready,
    Failed,
}

impl EnvStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(EnvStatus::Queued),
            "building" => Some(EnvStatus::Building),
            "ready" => Some(EnvStatus::Ready),
            "failed" => Some(EnvStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for EnvStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EnvStatus::Queued => "queued",
            EnvStatus::Building => "building",
            EnvStatus::Ready => "ready",
            EnvStatus::Failed => "failed",
        })
    }
}

/// An environment row as persisted by the work queue store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub key: EnvKey,
    pub status: EnvStatus,
    /// Interpreter version string captured at build time.
    pub interpreter_version: Option<String>,
    /// Plugin runtime version the environment was built for.
    pub runtime_version: Option<String>,
    pub built_at_ms: Option<u64>,
}
