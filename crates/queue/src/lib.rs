// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rf-queue: durable run ledger.
//!
//! A SQLite-backed work queue with atomic claims, heartbeat-renewed
//! leases, ownership-checked acknowledgements, a lease-expiry sweep,
//! and the advisory locks used for environment builds. All mutual
//! exclusion between workers lives here; workers share no memory.

pub mod backoff;
pub mod error;
pub mod store;

pub use backoff::Backoff;
pub use error::QueueError;
pub use store::{Claim, QueueConfig, WorkQueue};
