// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level integration specs.
//!
//! Each module exercises one slice of the run execution subsystem end
//! to end: the queue's claim/lease protocol across components, sandbox
//! validation of real plugin source, and a full submit-to-output run.

mod specs {
    mod end_to_end;
    mod queue;
    mod validation;
}
