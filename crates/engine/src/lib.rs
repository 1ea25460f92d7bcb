// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rf-engine: the pipeline runner and the worker loop.
//!
//! A worker claims runs from the queue, ensures the run's execution
//! environment exists (built at most once per deps digest, under an
//! advisory lock), drives the document through the phase-ordered
//! pipeline inside the sandbox, and acknowledges the outcome with
//! exponential backoff on transient failures. A separate sweeper task
//! reclaims runs whose lease expired without a heartbeat.

pub mod environment;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod stores;
pub mod sweeper;
pub mod worker;

pub use environment::{EnvError, EnvOutcome, EnvironmentManager};
pub use error::{PipelineError, PipelineErrorKind};
pub use pipeline::{
    run_pipeline, CancelProbe, NeverCancelled, PipelineContext, PipelineOutput, PluginSession,
    ValidationIssue,
};
pub use stores::{ConfigStore, DocumentStore, FsConfigStore, FsDocumentStore, StoreError};
pub use sweeper::LeaseSweeper;
pub use worker::{Worker, WorkerConfig};
