// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Phase-ordered pipeline runner.
//!
//! Drives one document through `load-config → hooks(before-run) →
//! extract → map → transform → validate → write → hooks(after-run)`.
//! A failure at any phase short-circuits the rest and is tagged with
//! the phase name; the run summary event is emitted on every terminal
//! path, so partial telemetry is never silently dropped. Cancellation
//! is observed between phases.

use std::collections::BTreeMap;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use rf_core::{EventSink, Phase, RunEvent, RunId, RunOutcome, Table};
use rf_mapper::{map_table, MapperConfig, TableMapping};
use rf_plugin::invoke::{CapabilityInvoker, TransformContext, ValidateContext};
use rf_plugin::{HookContext, HookRunSummary, PluginRegistry, Registrations};
use rf_sandbox::{PluginHost, SandboxError};

use crate::error::PipelineError;
use crate::extract;
use crate::stores::{ConfigStore, DocumentStore};

/// Observed between phases; a cancelled run aborts without acking.
pub trait CancelProbe: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

/// A probe that never cancels (tests, one-shot embedding).
pub struct NeverCancelled;

impl CancelProbe for NeverCancelled {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// A loaded plugin execution session: capability calls plus the initial
/// source load. Implemented by the sandbox's plugin host; tests script
/// it.
#[async_trait]
pub trait PluginSession: CapabilityInvoker {
    async fn load_plugin(&self, code: &str) -> Result<Registrations, PipelineError>;

    /// The session as a plain invoker (for the mapper seam).
    fn as_invoker(&self) -> &dyn CapabilityInvoker;
}

#[async_trait]
impl PluginSession for PluginHost {
    async fn load_plugin(&self, code: &str) -> Result<Registrations, PipelineError> {
        self.load(code).await.map_err(|error| match error {
            SandboxError::PluginLoad(message) => {
                PipelineError::config(Phase::LoadConfig, message)
            }
            other => PipelineError::pipeline(Phase::LoadConfig, other.to_string(), false),
        })
    }

    fn as_invoker(&self) -> &dyn CapabilityInvoker {
        self
    }
}

/// One per-cell validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub row: usize,
    pub field: String,
    pub message: String,
}

/// Everything the runner needs for one run.
pub struct PipelineContext<'a> {
    pub run_id: RunId,
    pub config_id: &'a str,
    pub document_id: &'a str,
    /// Region label handed to detectors and hooks (sheet name).
    pub region: &'a str,
    pub mapper: &'a MapperConfig,
    pub session: &'a dyn PluginSession,
    pub documents: &'a dyn DocumentStore,
    pub configs: &'a dyn ConfigStore,
    pub sink: &'a dyn EventSink,
    pub cancel: &'a dyn CancelProbe,
}

/// Terminal result of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub table: Table,
    pub mapping: TableMapping,
    pub output_document_id: String,
    pub validation_issues: Vec<ValidationIssue>,
}

struct PhaseTracker<'a> {
    run_id: RunId,
    sink: &'a dyn EventSink,
    cancel: &'a dyn CancelProbe,
    completed: usize,
}

impl PhaseTracker<'_> {
    fn begin(&self, phase: Phase) -> Result<Instant, PipelineError> {
        if self.cancel.is_cancelled() {
            return Err(PipelineError::cancelled(phase));
        }
        self.sink.emit(RunEvent::PhaseStarted {
            run_id: self.run_id.clone(),
            phase,
        });
        Ok(Instant::now())
    }

    fn complete(&mut self, phase: Phase, started: Instant) {
        self.completed += 1;
        self.sink.emit(RunEvent::PhaseCompleted {
            run_id: self.run_id.clone(),
            phase,
            elapsed_ms: started.elapsed().as_millis() as u64,
        });
    }
}

/// Run one document through the pipeline.
pub async fn run_pipeline(ctx: &PipelineContext<'_>) -> Result<PipelineOutput, PipelineError> {
    let started = Instant::now();
    let mut tracker = PhaseTracker {
        run_id: ctx.run_id.clone(),
        sink: ctx.sink,
        cancel: ctx.cancel,
        completed: 0,
    };

    let result = drive(ctx, &mut tracker).await;

    // Summary finalization runs on every terminal path.
    let outcome = match &result {
        Ok(_) => RunOutcome::Succeeded,
        Err(e) if e.is_cancelled() => RunOutcome::Cancelled,
        Err(_) => RunOutcome::Failed,
    };
    if let Err(error) = &result {
        ctx.sink.emit(RunEvent::PhaseFailed {
            run_id: ctx.run_id.clone(),
            phase: error.phase,
            error: error.to_string(),
        });
    }
    ctx.sink.emit(RunEvent::RunSummary {
        run_id: ctx.run_id.clone(),
        outcome,
        phases_completed: tracker.completed,
        elapsed_ms: started.elapsed().as_millis() as u64,
    });
    result
}

async fn drive(
    ctx: &PipelineContext<'_>,
    tracker: &mut PhaseTracker<'_>,
) -> Result<PipelineOutput, PipelineError> {
    // load-config: fetch source, check metadata, load into the sandbox,
    // freeze the registry.
    let phase = Phase::LoadConfig;
    let at = tracker.begin(phase)?;
    let code = ctx
        .configs
        .plugin_source(ctx.config_id)
        .await
        .map_err(|e| PipelineError::input(phase, e.to_string()))?;
    let (manifest, diagnostics) = rf_plugin::parse_manifest(&code, ctx.config_id);
    if manifest.is_none() {
        let detail = diagnostics
            .iter()
            .map(|(loc, msg)| format!("{loc}: {msg}"))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(PipelineError::config(phase, detail));
    }
    let registrations = ctx.session.load_plugin(&code).await?;
    let registry = PluginRegistry::from_registrations(registrations)
        .map_err(|e| PipelineError::config(phase, e.to_string()))?;
    tracker.complete(phase, at);

    // hooks(before-run)
    let phase = Phase::BeforeRunHooks;
    let at = tracker.begin(phase)?;
    run_stage_hooks(
        ctx,
        &registry,
        phase,
        HookContext::BeforeRun {
            region: ctx.region.to_string(),
        },
    )
    .await?;
    tracker.complete(phase, at);

    // extract
    let phase = Phase::Extract;
    let at = tracker.begin(phase)?;
    let bytes = ctx
        .documents
        .get(ctx.document_id)
        .await
        .map_err(|e| PipelineError::input(phase, e.to_string()))?;
    let source_table =
        extract::extract_table(&bytes).map_err(|e| PipelineError::input(phase, e.to_string()))?;
    tracker.complete(phase, at);

    // map
    let phase = Phase::Map;
    let at = tracker.begin(phase)?;
    let mapping = map_table(
        &source_table,
        ctx.region,
        &registry,
        ctx.session.as_invoker(),
        ctx.mapper,
    )
    .await
    .map_err(|e| match e {
        rf_mapper::MapperError::Invoke(inner) => PipelineError::from_invoke(phase, inner),
        other => PipelineError::pipeline(phase, other.to_string(), true),
    })?;
    let mut table = mapping
        .apply(&source_table)
        .map_err(|e| PipelineError::pipeline(phase, e.to_string(), true))?;
    for field in registry.fields().filter(|f| f.required) {
        if mapping.column_of(&field.name).is_none() {
            tracing::warn!(run = %ctx.run_id, field = %field.name, "required field is unmapped");
        }
    }
    ctx.sink.emit(RunEvent::TableMapped {
        run_id: ctx.run_id.clone(),
        mapped: mapping.mapped_count(),
        unmapped: mapping.unmapped_count(),
        passthrough: mapping.passthrough.len(),
    });
    if let Some(replacement) = run_stage_hooks(
        ctx,
        &registry,
        phase,
        HookContext::AfterTableMapped {
            region: ctx.region.to_string(),
            table: table.clone(),
            table_index: 0,
        },
    )
    .await?
    {
        table = replacement;
    }
    tracker.complete(phase, at);

    // transform
    let phase = Phase::Transform;
    let at = tracker.begin(phase)?;
    let mut patched_cells = 0usize;
    for row_index in 0..table.row_count() {
        run_stage_hooks(
            ctx,
            &registry,
            phase,
            HookContext::BeforeRow {
                region: ctx.region.to_string(),
                row_index,
                row: row_as_map(&table, row_index),
            },
        )
        .await?;
        for mapped in mapping.fields.iter().filter(|f| f.column.is_some()) {
            for transform in registry.transforms_for(&mapped.field) {
                let Some(column) = table.headers.iter().position(|h| h == &mapped.field) else {
                    continue;
                };
                let value = table.rows[row_index][column].clone();
                let transform_ctx = TransformContext {
                    field: mapped.field.clone(),
                    value,
                    row: row_as_map(&table, row_index),
                };
                let cells = ctx
                    .session
                    .as_invoker()
                    .transform(transform, &transform_ctx)
                    .await
                    .map_err(|e| PipelineError::from_invoke(phase, e))?;
                for (field, value) in cells {
                    if let Some(target) = table.headers.iter().position(|h| h == &field) {
                        table.rows[row_index][target] = value;
                        patched_cells += 1;
                    } else {
                        tracing::debug!(field, "transform patched an unknown output column");
                    }
                }
            }
        }
    }
    ctx.sink.emit(RunEvent::RowsTransformed {
        run_id: ctx.run_id.clone(),
        rows: table.row_count(),
        patched_cells,
    });
    if let Some(replacement) = run_stage_hooks(
        ctx,
        &registry,
        phase,
        HookContext::AfterTableTransformed {
            region: ctx.region.to_string(),
            table: table.clone(),
            table_index: 0,
        },
    )
    .await?
    {
        table = replacement;
    }
    tracker.complete(phase, at);

    // validate
    let phase = Phase::Validate;
    let at = tracker.begin(phase)?;
    let mut issues = Vec::new();
    for row_index in 0..table.row_count() {
        for mapped in mapping.fields.iter().filter(|f| f.column.is_some()) {
            let Some(column) = table.headers.iter().position(|h| h == &mapped.field) else {
                continue;
            };
            for validator in registry.validators_for(&mapped.field) {
                let validate_ctx = ValidateContext {
                    field: mapped.field.clone(),
                    value: table.rows[row_index][column].clone(),
                    row: row_as_map(&table, row_index),
                };
                let messages = ctx
                    .session
                    .as_invoker()
                    .validate_cell(validator, &validate_ctx)
                    .await
                    .map_err(|e| PipelineError::from_invoke(phase, e))?;
                for message in messages {
                    issues.push(ValidationIssue {
                        row: row_index,
                        field: mapped.field.clone(),
                        message,
                    });
                }
            }
        }
    }
    ctx.sink.emit(RunEvent::ValidationIssues {
        run_id: ctx.run_id.clone(),
        issues: issues.len(),
    });
    if let Some(replacement) = run_stage_hooks(
        ctx,
        &registry,
        phase,
        HookContext::AfterTableValidated {
            region: ctx.region.to_string(),
            table: table.clone(),
            table_index: 0,
        },
    )
    .await?
    {
        table = replacement;
    }
    tracker.complete(phase, at);

    // write
    let phase = Phase::Write;
    let at = tracker.begin(phase)?;
    run_stage_hooks(
        ctx,
        &registry,
        phase,
        HookContext::BeforeSave {
            region: ctx.region.to_string(),
            table: table.clone(),
        },
    )
    .await?;
    let output_document_id = format!("{}.out.csv", ctx.run_id);
    let bytes = extract::write_csv(&table)
        .map_err(|e| PipelineError::pipeline(phase, e.to_string(), true))?;
    ctx.documents
        .put(&output_document_id, &bytes)
        .await
        .map_err(|e| PipelineError::input(phase, e.to_string()))?;
    tracker.complete(phase, at);

    // hooks(after-run)
    let phase = Phase::AfterRunHooks;
    let at = tracker.begin(phase)?;
    run_stage_hooks(
        ctx,
        &registry,
        phase,
        HookContext::AfterRun {
            region: ctx.region.to_string(),
            summary: HookRunSummary {
                rows: table.row_count(),
                mapped_fields: mapping.mapped_count(),
                validation_issues: issues.len(),
            },
        },
    )
    .await?;
    tracker.complete(phase, at);

    Ok(PipelineOutput {
        table,
        mapping,
        output_document_id,
        validation_issues: issues,
    })
}

fn row_as_map(table: &Table, row_index: usize) -> BTreeMap<String, String> {
    table
        .headers
        .iter()
        .cloned()
        .zip(table.rows[row_index].iter().cloned())
        .collect()
}

/// Run every hook of the context's stage in priority order.
///
/// For table-returning stages the last hook to return a table wins;
/// each hook sees the table as replaced by its predecessors.
async fn run_stage_hooks(
    ctx: &PipelineContext<'_>,
    registry: &PluginRegistry,
    phase: Phase,
    hook_ctx: HookContext,
) -> Result<Option<Table>, PipelineError> {
    let hooks = registry.hooks_for(hook_ctx.stage());
    if hooks.is_empty() {
        return Ok(None);
    }
    let mut current: Option<Table> = None;
    let mut hook_ctx = hook_ctx;
    for hook in hooks {
        let replaced = ctx
            .session
            .as_invoker()
            .run_hook(hook, &hook_ctx)
            .await
            .map_err(|e| PipelineError::from_hook_invoke(phase, e))?;
        if let Some(new_table) = replaced {
            // Replacement tables cross the sandbox boundary unchecked;
            // re-validate before anything indexes into the rows.
            let new_table = Table::new(new_table.headers, new_table.rows).map_err(|e| {
                PipelineError::hook(
                    phase,
                    format!("hook '{}' returned an invalid table: {e}", hook.qualname),
                )
            })?;
            hook_ctx = rebuild_table_context(&hook_ctx, &new_table);
            current = Some(new_table);
        }
    }
    Ok(current)
}

/// Re-point a table-carrying context at a replacement table.
fn rebuild_table_context(ctx: &HookContext, table: &Table) -> HookContext {
    match ctx {
        HookContext::AfterTableMapped {
            region,
            table_index,
            ..
        } => HookContext::AfterTableMapped {
            region: region.clone(),
            table: table.clone(),
            table_index: *table_index,
        },
        HookContext::AfterTableTransformed {
            region,
            table_index,
            ..
        } => HookContext::AfterTableTransformed {
            region: region.clone(),
            table: table.clone(),
            table_index: *table_index,
        },
        HookContext::AfterTableValidated {
            region,
            table_index,
            ..
        } => HookContext::AfterTableValidated {
            region: region.clone(),
            table: table.clone(),
            table_index: *table_index,
        },
        other => other.clone(),
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
