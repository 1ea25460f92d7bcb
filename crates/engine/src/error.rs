// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline error taxonomy.
//!
//! `PipelineError` is the only run-terminating error in the system, and
//! it always carries the phase that failed. Retry policy lives on the
//! error: input and transient pipeline failures retry with backoff up
//! to the attempt cap; configuration defects (bad manifest, load
//! failure, capability contract violations) and hook failures are
//! permanent, as is cancellation.

use thiserror::Error;

use rf_core::Phase;
use rf_plugin::invoke::InvokeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineErrorKind {
    /// Plugin/configuration defect (manifest, registration, load).
    Config(String),
    /// Document or source material could not be read or parsed.
    Input(String),
    /// A hook failed or broke its contract.
    Hook(String),
    /// Anything else inside the pipeline.
    Pipeline { message: String, permanent: bool },
    /// The run was cancelled out-of-band.
    Cancelled,
}

/// A failed run attempt, tagged with the phase that failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("stage={phase}: {}", self.message())]
pub struct PipelineError {
    pub phase: Phase,
    pub kind: PipelineErrorKind,
}

impl PipelineError {
    pub fn config(phase: Phase, message: impl Into<String>) -> Self {
        Self {
            phase,
            kind: PipelineErrorKind::Config(message.into()),
        }
    }

    pub fn input(phase: Phase, message: impl Into<String>) -> Self {
        Self {
            phase,
            kind: PipelineErrorKind::Input(message.into()),
        }
    }

    pub fn hook(phase: Phase, message: impl Into<String>) -> Self {
        Self {
            phase,
            kind: PipelineErrorKind::Hook(message.into()),
        }
    }

    pub fn pipeline(phase: Phase, message: impl Into<String>, permanent: bool) -> Self {
        Self {
            phase,
            kind: PipelineErrorKind::Pipeline {
                message: message.into(),
                permanent,
            },
        }
    }

    pub fn cancelled(phase: Phase) -> Self {
        Self {
            phase,
            kind: PipelineErrorKind::Cancelled,
        }
    }

    /// Classify a capability failure outside hook stages.
    pub fn from_invoke(phase: Phase, error: InvokeError) -> Self {
        let permanent = !error.is_transient();
        Self::pipeline(phase, error.to_string(), permanent)
    }

    /// Classify a capability failure inside a hook stage.
    pub fn from_hook_invoke(phase: Phase, error: InvokeError) -> Self {
        if error.is_transient() {
            Self::pipeline(phase, error.to_string(), false)
        } else {
            Self::hook(phase, error.to_string())
        }
    }

    fn message(&self) -> String {
        match &self.kind {
            PipelineErrorKind::Config(m)
            | PipelineErrorKind::Input(m)
            | PipelineErrorKind::Hook(m) => m.clone(),
            PipelineErrorKind::Pipeline { message, .. } => message.clone(),
            PipelineErrorKind::Cancelled => "run cancelled".to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == PipelineErrorKind::Cancelled
    }

    /// Whether the worker may retry this attempt (subject to the run's
    /// attempt cap).
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            PipelineErrorKind::Config(_)
            | PipelineErrorKind::Hook(_)
            | PipelineErrorKind::Cancelled => false,
            PipelineErrorKind::Input(_) => true,
            PipelineErrorKind::Pipeline { permanent, .. } => !permanent,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
