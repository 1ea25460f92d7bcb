// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rf-sandbox: out-of-process plugin execution.
//!
//! Untrusted plugin code runs in a supervised `python3` child: the
//! parent writes NDJSON requests to the child's stdin and reads NDJSON
//! responses from its stdout, enforcing a wall-clock deadline and
//! killing the child on overrun. The embedded driver restricts imports
//! and builtins and poisons the socket module before touching plugin
//! code, so a plugin cannot reach the network, the filesystem, or other
//! processes.
//!
//! Two call shapes share that isolation contract: one-shot validation
//! (a fresh child per call, terminated immediately after) and the
//! long-lived per-run [`PluginHost`] the pipeline drives.

pub mod driver;
pub mod host;
pub mod protocol;
pub mod supervisor;
pub mod validate;

pub use host::PluginHost;
pub use protocol::{SandboxError, SandboxOptions, ValidationOutcome};
pub use validate::validate;
