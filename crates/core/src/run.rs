// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run identifier and state machine.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a run.
    ///
    /// Each submitted run gets a unique ID used to track queue state,
    /// query status, and reference the run in logs and telemetry.
    pub struct RunId("run-");
}

crate::define_id! {
    /// Unique identifier for a worker process.
    pub struct WorkerId("wkr-");
}

/// Queue status of a run.
///
/// `Succeeded`, `Failed` and `Cancelled` are terminal and absorbing: only
/// the work queue's ownership-checked operations move a run between the
/// non-terminal states, and nothing moves it out of a terminal one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// Check if this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::Failed | RunStatus::Cancelled
        )
    }

    /// Parse from the stored column value.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(RunStatus::Queued),
            "running" => Some(RunStatus::Running),
            "succeeded" => Some(RunStatus::Succeeded),
            "failed" => Some(RunStatus::Failed),
            "cancelled" => Some(RunStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        })
    }
}

/// Parameters for submitting a new run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRun {
    pub workspace_id: String,
    pub config_id: String,
    pub document_id: String,
    /// Content hash identifying the execution environment for this run.
    pub deps_digest: String,
    pub max_attempts: u32,
}

impl NewRun {
    pub fn new(
        workspace_id: impl Into<String>,
        config_id: impl Into<String>,
        document_id: impl Into<String>,
        deps_digest: impl Into<String>,
    ) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            config_id: config_id.into(),
            document_id: document_id.into(),
            deps_digest: deps_digest.into(),
            max_attempts: 3,
        }
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }
}

/// A run row as persisted by the work queue.
///
/// Mutated only by queue operations (claim, heartbeat, ack, sweep); the
/// claim protocol guarantees at most one worker owns a `Running` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub workspace_id: String,
    pub config_id: String,
    pub document_id: String,
    pub deps_digest: String,
    pub status: RunStatus,
    pub attempt_count: u32,
    pub max_attempts: u32,
    /// Earliest epoch-ms instant at which the run may be claimed.
    pub available_at_ms: u64,
    pub created_at_ms: u64,
    /// Worker currently holding the claim, if any.
    pub claimed_by: Option<WorkerId>,
    /// Lease deadline; a running row past this instant without a heartbeat
    /// is reclaimed by the sweep.
    pub claim_expires_at_ms: Option<u64>,
    pub started_at_ms: Option<u64>,
    pub completed_at_ms: Option<u64>,
    pub error_message: Option<String>,
}

impl Run {
    /// Check if the run can still be retried after a failure.
    pub fn has_attempts_left(&self) -> bool {
        self.attempt_count < self.max_attempts
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
