// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered run lifecycle telemetry.
//!
//! The pipeline emits one event stream per run: phase transitions, the
//! mapping/transform/validation milestones, and a final summary. The
//! summary is emitted on every terminal path, including failures, so
//! partial telemetry is never silently dropped.

use serde::{Deserialize, Serialize};

use crate::run::RunId;

/// Pipeline phase, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    LoadConfig,
    BeforeRunHooks,
    Extract,
    Map,
    Transform,
    Validate,
    Write,
    AfterRunHooks,
}

impl Phase {
    /// All phases in execution order.
    pub const ALL: [Phase; 8] = [
        Phase::LoadConfig,
        Phase::BeforeRunHooks,
        Phase::Extract,
        Phase::Map,
        Phase::Transform,
        Phase::Validate,
        Phase::Write,
        Phase::AfterRunHooks,
    ];
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Phase::LoadConfig => "load-config",
            Phase::BeforeRunHooks => "before-run-hooks",
            Phase::Extract => "extract",
            Phase::Map => "map",
            Phase::Transform => "transform",
            Phase::Validate => "validate",
            Phase::Write => "write",
            Phase::AfterRunHooks => "after-run-hooks",
        })
    }
}

/// Terminal outcome of a run attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Succeeded,
    Failed,
    Cancelled,
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RunOutcome::Succeeded => "succeeded",
            RunOutcome::Failed => "failed",
            RunOutcome::Cancelled => "cancelled",
        })
    }
}

/// One entry in a run's telemetry stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    PhaseStarted {
        run_id: RunId,
        phase: Phase,
    },
    PhaseCompleted {
        run_id: RunId,
        phase: Phase,
        elapsed_ms: u64,
    },
    PhaseFailed {
        run_id: RunId,
        phase: Phase,
        error: String,
    },
    TableMapped {
        run_id: RunId,
        mapped: usize,
        unmapped: usize,
        passthrough: usize,
    },
    RowsTransformed {
        run_id: RunId,
        rows: usize,
        patched_cells: usize,
    },
    ValidationIssues {
        run_id: RunId,
        issues: usize,
    },
    RunSummary {
        run_id: RunId,
        outcome: RunOutcome,
        phases_completed: usize,
        elapsed_ms: u64,
    },
}

impl RunEvent {
    /// One-line `key=value` rendering for logs.
    pub fn log_summary(&self) -> String {
        match self {
            RunEvent::PhaseStarted { run_id, phase } => {
                format!("phase_started run={run_id} phase={phase}")
            }
            RunEvent::PhaseCompleted {
                run_id,
                phase,
                elapsed_ms,
            } => format!("phase_completed run={run_id} phase={phase} elapsed_ms={elapsed_ms}"),
            RunEvent::PhaseFailed {
                run_id,
                phase,
                error,
            } => format!("phase_failed run={run_id} phase={phase} error={error}"),
            RunEvent::TableMapped {
                run_id,
                mapped,
                unmapped,
                passthrough,
            } => format!(
                "table_mapped run={run_id} mapped={mapped} unmapped={unmapped} passthrough={passthrough}"
            ),
            RunEvent::RowsTransformed {
                run_id,
                rows,
                patched_cells,
            } => format!("rows_transformed run={run_id} rows={rows} patched_cells={patched_cells}"),
            RunEvent::ValidationIssues { run_id, issues } => {
                format!("validation_issues run={run_id} issues={issues}")
            }
            RunEvent::RunSummary {
                run_id,
                outcome,
                phases_completed,
                elapsed_ms,
            } => format!(
                "run_summary run={run_id} outcome={outcome} phases_completed={phases_completed} elapsed_ms={elapsed_ms}"
            ),
        }
    }
}

/// Sink for run telemetry events.
///
/// Implementations must tolerate being called from multiple phases of the
/// same run in order; no cross-run ordering is implied.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: RunEvent);
}

/// Production sink: forwards each event to `tracing` at info level.
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: RunEvent) {
        tracing::info!("{}", event.log_summary());
    }
}

/// Collecting sink for tests and run reports.
#[derive(Debug, Default)]
pub struct CollectSink {
    events: parking_lot::Mutex<Vec<RunEvent>>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far, in emission order.
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().clone()
    }
}

impl EventSink for CollectSink {
    fn emit(&self, event: RunEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
#[path = "telemetry_tests.rs"]
mod tests;
