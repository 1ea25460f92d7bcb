// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed work queue store.
//!
//! Uses a single `Mutex<Connection>` for thread safety within a process;
//! cross-process safety comes from SQLite's write serialization (WAL
//! journal, busy timeout). Every mutation is a single ownership-checked
//! statement, so concurrent workers can never both mutate the same
//! running row: the claim is one atomic `UPDATE ... RETURNING`, and
//! heartbeat/ack statements match on `claimed_by`.

use std::path::Path;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use rusqlite::{params, Connection, OptionalExtension};

use rf_core::{EnvKey, EnvStatus, Environment, NewRun, Run, RunId, RunStatus, WorkerId};

use crate::backoff::Backoff;
use crate::error::{QueueError, Result};

/// Idempotent DDL for queue tables.
const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS runs (
    id TEXT PRIMARY KEY,
    workspace_id TEXT NOT NULL,
    config_id TEXT NOT NULL,
    document_id TEXT NOT NULL,
    deps_digest TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'queued',
    attempt_count INTEGER NOT NULL DEFAULT 0,
    max_attempts INTEGER NOT NULL DEFAULT 3,
    available_at INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    claimed_by TEXT,
    claim_expires_at INTEGER,
    started_at INTEGER,
    completed_at INTEGER,
    error_message TEXT
);

CREATE INDEX IF NOT EXISTS idx_runs_claim
    ON runs (status, available_at, created_at);

CREATE TABLE IF NOT EXISTS environments (
    workspace_id TEXT NOT NULL,
    config_id TEXT NOT NULL,
    deps_digest TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'queued',
    interpreter_version TEXT,
    runtime_version TEXT,
    built_at INTEGER,
    PRIMARY KEY (workspace_id, config_id, deps_digest)
);

CREATE TABLE IF NOT EXISTS advisory_locks (
    name TEXT PRIMARY KEY,
    owner TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);
";

/// Queue tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    /// Lease duration granted by `claim` and renewed by `heartbeat`.
    pub lease_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { lease_ms: 60_000 }
    }
}

/// A claimed run, handed to a worker for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub run_id: RunId,
    pub workspace_id: String,
    pub config_id: String,
    pub document_id: String,
    pub deps_digest: String,
    /// Attempt number this claim represents, counted from 1.
    pub attempt_count: u32,
    pub max_attempts: u32,
}

impl Claim {
    pub fn env_key(&self) -> EnvKey {
        EnvKey::new(
            self.workspace_id.clone(),
            self.config_id.clone(),
            self.deps_digest.clone(),
        )
    }
}

/// SQLite-backed run ledger.
pub struct WorkQueue {
    conn: Mutex<Connection>,
    lease_ms: u64,
}

impl WorkQueue {
    /// Open (creating if necessary) a file-backed queue.
    pub fn open(path: &Path, config: QueueConfig) -> Result<Self> {
        let conn = Connection::open(path)?;
        // journal_mode replies with the resulting mode, so query it
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        Self::init(conn, config)
    }

    /// Open an in-memory queue (tests and single-process embedding).
    pub fn open_in_memory(config: QueueConfig) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, config)
    }

    fn init(conn: Connection, config: QueueConfig) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
            lease_ms: config.lease_ms,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    // === Run lifecycle ===

    /// Insert a new queued run, immediately claimable.
    pub fn submit(&self, new: &NewRun, now_ms: u64) -> Result<RunId> {
        let id = RunId::generate();
        self.lock().execute(
            "INSERT INTO runs (id, workspace_id, config_id, document_id, deps_digest,
                               status, max_attempts, available_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'queued', ?6, ?7, ?7)",
            params![
                id.as_str(),
                new.workspace_id,
                new.config_id,
                new.document_id,
                new.deps_digest,
                new.max_attempts,
                now_ms as i64,
            ],
        )?;
        tracing::debug!(run = %id, document = %new.document_id, "run submitted");
        Ok(id)
    }

    /// Atomically claim up to `limit` eligible runs for `worker`.
    ///
    /// Eligible rows are `queued`, available, and below their attempt cap,
    /// taken FIFO by `(available_at, created_at)`. Claimed rows move to
    /// `running` with a fresh lease and an incremented attempt count.
    /// SQLite serializes writers, so two workers can never claim
    /// overlapping rows; a contended claim simply returns fewer (or zero)
    /// rows.
    pub fn claim(&self, worker: &WorkerId, limit: u32, now_ms: u64) -> Result<Vec<Claim>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "UPDATE runs SET
                 status = 'running',
                 claimed_by = ?1,
                 claim_expires_at = ?2 + ?3,
                 attempt_count = attempt_count + 1,
                 error_message = NULL,
                 started_at = ?2
             WHERE id IN (
                 SELECT id FROM runs
                 WHERE status = 'queued'
                   AND available_at <= ?2
                   AND attempt_count < max_attempts
                 ORDER BY available_at, created_at
                 LIMIT ?4
             )
             RETURNING id, workspace_id, config_id, document_id, deps_digest,
                       attempt_count, max_attempts, available_at, created_at",
        )?;
        let mut claims: Vec<(i64, i64, Claim)> = stmt
            .query_map(
                params![worker.as_str(), now_ms as i64, self.lease_ms as i64, limit],
                |row| {
                    let claim = Claim {
                        run_id: RunId::new(row.get::<_, String>(0)?),
                        workspace_id: row.get(1)?,
                        config_id: row.get(2)?,
                        document_id: row.get(3)?,
                        deps_digest: row.get(4)?,
                        attempt_count: row.get(5)?,
                        max_attempts: row.get(6)?,
                    };
                    Ok((row.get::<_, i64>(7)?, row.get::<_, i64>(8)?, claim))
                },
            )?
            .collect::<std::result::Result<_, rusqlite::Error>>()?;
        // RETURNING row order is unspecified; restore FIFO claim order.
        claims.sort_by_key(|(available, created, _)| (*available, *created));
        let claims: Vec<Claim> = claims.into_iter().map(|(_, _, c)| c).collect();
        if !claims.is_empty() {
            tracing::debug!(worker = %worker, count = claims.len(), "claimed runs");
        }
        Ok(claims)
    }

    /// Extend the lease of a running run, only while still owned by
    /// `worker`. Returns false if ownership was lost (lease expired and
    /// the run was reclaimed, or the run reached a terminal state).
    pub fn heartbeat(&self, run: &RunId, worker: &WorkerId, now_ms: u64) -> Result<bool> {
        let changed = self.lock().execute(
            "UPDATE runs SET claim_expires_at = ?1 + ?2
             WHERE id = ?3 AND status = 'running' AND claimed_by = ?4",
            params![
                now_ms as i64,
                self.lease_ms as i64,
                run.as_str(),
                worker.as_str()
            ],
        )?;
        Ok(changed == 1)
    }

    /// Transition `running -> succeeded`, only while owned by the caller.
    pub fn ack_success(&self, run: &RunId, worker: &WorkerId, now_ms: u64) -> Result<bool> {
        let changed = self.lock().execute(
            "UPDATE runs SET status = 'succeeded', completed_at = ?1,
                             claimed_by = NULL, claim_expires_at = NULL
             WHERE id = ?2 AND status = 'running' AND claimed_by = ?3",
            params![now_ms as i64, run.as_str(), worker.as_str()],
        )?;
        Ok(changed == 1)
    }

    /// Acknowledge a failed attempt, only while owned by the caller.
    ///
    /// With `retry_at_ms` the run goes back to `queued` with its
    /// availability advanced; without it the run is terminally `failed`.
    pub fn ack_failure(
        &self,
        run: &RunId,
        worker: &WorkerId,
        now_ms: u64,
        message: &str,
        retry_at_ms: Option<u64>,
    ) -> Result<bool> {
        let changed = match retry_at_ms {
            Some(retry_at) => self.lock().execute(
                "UPDATE runs SET status = 'queued', available_at = ?1,
                                 error_message = ?2,
                                 claimed_by = NULL, claim_expires_at = NULL
                 WHERE id = ?3 AND status = 'running' AND claimed_by = ?4",
                params![retry_at as i64, message, run.as_str(), worker.as_str()],
            )?,
            None => self.lock().execute(
                "UPDATE runs SET status = 'failed', completed_at = ?1,
                                 error_message = ?2,
                                 claimed_by = NULL, claim_expires_at = NULL
                 WHERE id = ?3 AND status = 'running' AND claimed_by = ?4",
                params![now_ms as i64, message, run.as_str(), worker.as_str()],
            )?,
        };
        Ok(changed == 1)
    }

    /// Reclaim running rows whose lease expired without a heartbeat.
    ///
    /// Rows below their attempt cap are requeued with availability pushed
    /// out by the backoff schedule; rows at the cap become terminally
    /// `failed`. This is the only recovery path for orphaned runs.
    pub fn expire_leases(&self, now_ms: u64, backoff: &Backoff) -> Result<u64> {
        let conn = self.lock();
        let requeued = conn.execute(
            "UPDATE runs SET status = 'queued',
                             claimed_by = NULL, claim_expires_at = NULL,
                             available_at = ?1 + MIN(?2, ?3 << MIN(attempt_count - 1, 20))
             WHERE status = 'running' AND claim_expires_at < ?1
               AND attempt_count < max_attempts",
            params![now_ms as i64, backoff.max_ms as i64, backoff.base_ms as i64],
        )?;
        let failed = conn.execute(
            "UPDATE runs SET status = 'failed', completed_at = ?1,
                             claimed_by = NULL, claim_expires_at = NULL,
                             error_message = 'lease expired after max attempts'
             WHERE status = 'running' AND claim_expires_at < ?1
               AND attempt_count >= max_attempts",
            params![now_ms as i64],
        )?;
        if requeued + failed > 0 {
            tracing::info!(requeued, failed, "expired stale leases");
        }
        Ok((requeued + failed) as u64)
    }

    /// Mark a run cancelled out-of-band. Workers observe this between
    /// pipeline phases and abort; the row is already terminal, so a lost
    /// race with an ack is harmless.
    pub fn cancel(&self, run: &RunId, now_ms: u64) -> Result<bool> {
        let changed = self.lock().execute(
            "UPDATE runs SET status = 'cancelled', completed_at = ?1,
                             claimed_by = NULL, claim_expires_at = NULL
             WHERE id = ?2 AND status IN ('queued', 'running')",
            params![now_ms as i64, run.as_str()],
        )?;
        Ok(changed == 1)
    }

    /// Fetch one run row.
    pub fn get(&self, run: &RunId) -> Result<Option<Run>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, workspace_id, config_id, document_id, deps_digest, status,
                    attempt_count, max_attempts, available_at, created_at,
                    claimed_by, claim_expires_at, started_at, completed_at, error_message
             FROM runs WHERE id = ?1",
        )?;
        let row = stmt
            .query_row(params![run.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, u32>(6)?,
                    row.get::<_, u32>(7)?,
                    row.get::<_, i64>(8)?,
                    row.get::<_, i64>(9)?,
                    row.get::<_, Option<String>>(10)?,
                    row.get::<_, Option<i64>>(11)?,
                    row.get::<_, Option<i64>>(12)?,
                    row.get::<_, Option<i64>>(13)?,
                    row.get::<_, Option<String>>(14)?,
                ))
            })
            .optional()?;
        let Some(row) = row else {
            return Ok(None);
        };
        let status = RunStatus::parse(&row.5).ok_or_else(|| QueueError::CorruptRow {
            id: row.0.clone(),
            column: "status",
            value: row.5.clone(),
        })?;
        Ok(Some(Run {
            id: RunId::new(row.0),
            workspace_id: row.1,
            config_id: row.2,
            document_id: row.3,
            deps_digest: row.4,
            status,
            attempt_count: row.6,
            max_attempts: row.7,
            available_at_ms: row.8 as u64,
            created_at_ms: row.9 as u64,
            claimed_by: row.10.map(WorkerId::new),
            claim_expires_at_ms: row.11.map(|v| v as u64),
            started_at_ms: row.12.map(|v| v as u64),
            completed_at_ms: row.13.map(|v| v as u64),
            error_message: row.14,
        }))
    }

    /// Current status of one run.
    pub fn status(&self, run: &RunId) -> Result<Option<RunStatus>> {
        let conn = self.lock();
        let value: Option<String> = conn
            .query_row(
                "SELECT status FROM runs WHERE id = ?1",
                params![run.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match value {
            None => Ok(None),
            Some(v) => RunStatus::parse(&v)
                .map(Some)
                .ok_or_else(|| QueueError::CorruptRow {
                    id: run.to_string(),
                    column: "status",
                    value: v,
                }),
        }
    }

    // === Advisory locks ===

    /// Try to take a named advisory lock until `now + ttl`. Re-acquiring
    /// a lock already held by `owner` refreshes its expiry. Returns false
    /// while another owner holds an unexpired lock.
    pub fn try_lock(&self, name: &str, owner: &str, ttl_ms: u64, now_ms: u64) -> Result<bool> {
        let conn = self.lock();
        conn.execute(
            "DELETE FROM advisory_locks WHERE expires_at < ?1",
            params![now_ms as i64],
        )?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO advisory_locks (name, owner, expires_at)
             VALUES (?1, ?2, ?3)",
            params![name, owner, (now_ms + ttl_ms) as i64],
        )?;
        if inserted == 1 {
            return Ok(true);
        }
        let refreshed = conn.execute(
            "UPDATE advisory_locks SET expires_at = ?1
             WHERE name = ?2 AND owner = ?3",
            params![(now_ms + ttl_ms) as i64, name, owner],
        )?;
        Ok(refreshed == 1)
    }

    /// Release a lock held by `owner`. Releasing a lock not held is a
    /// no-op returning false.
    pub fn unlock(&self, name: &str, owner: &str) -> Result<bool> {
        let changed = self.lock().execute(
            "DELETE FROM advisory_locks WHERE name = ?1 AND owner = ?2",
            params![name, owner],
        )?;
        Ok(changed == 1)
    }

    // === Environments ===

    /// Fetch one environment row.
    pub fn environment(&self, key: &EnvKey) -> Result<Option<Environment>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT status, interpreter_version, runtime_version, built_at
                 FROM environments
                 WHERE workspace_id = ?1 AND config_id = ?2 AND deps_digest = ?3",
                params![key.workspace_id, key.config_id, key.deps_digest],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<i64>>(3)?,
                    ))
                },
            )
            .optional()?;
        let Some((status, interpreter, runtime, built_at)) = row else {
            return Ok(None);
        };
        let status = EnvStatus::parse(&status).ok_or_else(|| QueueError::CorruptRow {
            id: key.deps_digest.clone(),
            column: "status",
            value: status,
        })?;
        Ok(Some(Environment {
            key: key.clone(),
            status,
            interpreter_version: interpreter,
            runtime_version: runtime,
            built_at_ms: built_at.map(|v| v as u64),
        }))
    }

    /// Insert the environment row if absent, leaving an existing row
    /// untouched.
    pub fn ensure_environment(&self, key: &EnvKey, status: EnvStatus) -> Result<()> {
        self.lock().execute(
            "INSERT OR IGNORE INTO environments (workspace_id, config_id, deps_digest, status)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                key.workspace_id,
                key.config_id,
                key.deps_digest,
                status.to_string()
            ],
        )?;
        Ok(())
    }

    /// Update an environment's status and build metadata.
    pub fn mark_environment(
        &self,
        key: &EnvKey,
        status: EnvStatus,
        interpreter_version: Option<&str>,
        runtime_version: Option<&str>,
        now_ms: u64,
    ) -> Result<()> {
        self.lock().execute(
            "UPDATE environments SET status = ?1,
                    interpreter_version = COALESCE(?2, interpreter_version),
                    runtime_version = COALESCE(?3, runtime_version),
                    built_at = ?4
             WHERE workspace_id = ?5 AND config_id = ?6 AND deps_digest = ?7",
            params![
                status.to_string(),
                interpreter_version,
                runtime_version,
                now_ms as i64,
                key.workspace_id,
                key.config_id,
                key.deps_digest,
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
