// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child process supervision.
//!
//! One [`ChildProc`] wraps one `python3 -u -I -c <driver>` subprocess
//! and its NDJSON pipes. Every request runs under a wall-clock deadline;
//! on overrun the child is killed, never waited on. `kill_on_drop`
//! guarantees no orphaned interpreters when the supervisor is dropped
//! mid-conversation.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::driver::PY_DRIVER;
use crate::protocol::{Request, Response, SandboxError, SandboxOptions};

pub(crate) struct ChildProc {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl ChildProc {
    /// Spawn a fresh sandbox child.
    pub(crate) fn spawn(opts: &SandboxOptions) -> Result<Self, SandboxError> {
        let mut cmd = Command::new(&opts.python_bin);
        cmd.arg("-u").arg("-I").arg("-c").arg(PY_DRIVER);
        if let Some(limit) = opts.memory_limit_bytes {
            cmd.arg(limit.to_string());
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(SandboxError::Spawn)?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SandboxError::Protocol("child stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SandboxError::Protocol("child stdout unavailable".to_string()))?;
        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    /// One request/response round trip under a deadline.
    ///
    /// On timeout or IO failure the child is killed before returning, so
    /// a hung or crashed interpreter can never outlive the call.
    pub(crate) async fn request(
        &mut self,
        request: &Request,
        timeout: Duration,
    ) -> Result<Response, SandboxError> {
        let mut line = serde_json::to_string(request)
            .map_err(|e| SandboxError::Protocol(format!("unserializable request: {e}")))?;
        line.push('\n');

        let round_trip = tokio::time::timeout(timeout, async {
            self.stdin.write_all(line.as_bytes()).await?;
            self.stdin.flush().await?;
            let mut buf = String::new();
            let read = self.stdout.read_line(&mut buf).await?;
            Ok::<_, std::io::Error>((read, buf))
        })
        .await;

        match round_trip {
            Err(_elapsed) => {
                self.kill().await;
                Err(SandboxError::Timeout(timeout))
            }
            Ok(Err(io)) => {
                self.kill().await;
                Err(SandboxError::Io(io))
            }
            Ok(Ok((0, _))) => Err(SandboxError::Closed),
            Ok(Ok((_, buf))) => serde_json::from_str(&buf)
                .map_err(|e| SandboxError::Protocol(format!("bad response: {e}"))),
        }
    }

    /// Terminate the child immediately.
    pub(crate) async fn kill(&mut self) {
        if let Err(error) = self.child.kill().await {
            tracing::debug!(%error, "sandbox child kill failed (already gone?)");
        }
    }

    /// Polite shutdown: ask the driver to exit, then make sure it did.
    pub(crate) async fn shutdown(mut self) {
        let _ = self
            .request(&Request::Shutdown, Duration::from_millis(500))
            .await;
        self.kill().await;
    }
}
