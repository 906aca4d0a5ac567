//! Subprocess engine backend.
//!
//! Spawns the engine with `tokio::process`, so waiting on it is driven by the
//! runtime's reactor and never parks a worker thread. A deadline is enforced
//! around the wait; on expiry the child is killed and reaped before the
//! timeout is reported.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::backend::{EngineBackend, EngineInvocation, EngineOutput};
use crate::ExecutorError;

/// Bytes of engine stderr kept for diagnostics.
const STDERR_LIMIT: usize = 64 * 1024;

/// How long to keep draining stderr after the engine has exited.
const STDERR_DRAIN: Duration = Duration::from_secs(1);

/// `CREATE_NO_WINDOW`: keep console engines from flashing a window.
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Runs the engine as a local child process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEngine;

impl ProcessEngine {
    /// Create the backend.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EngineBackend for ProcessEngine {
    async fn run(
        &self,
        invocation: &EngineInvocation,
        timeout: Duration,
    ) -> Result<EngineOutput, ExecutorError> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(windows)]
        command.creation_flags(CREATE_NO_WINDOW);

        tracing::info!(
            job_id = %invocation.job_id,
            program = %invocation.program.display(),
            args = ?invocation.args,
            timeout_ms = timeout.as_millis(),
            "spawning engine"
        );

        let started = Instant::now();
        let mut child = command.spawn().map_err(|e| ExecutorError::SpawnFailed {
            program: invocation.program.clone(),
            reason: e.to_string(),
        })?;

        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            match stderr {
                Some(pipe) => drain_capped(pipe, STDERR_LIMIT).await,
                None => Vec::new(),
            }
        });

        let waited = tokio::time::timeout(timeout, child.wait()).await;
        let status = match waited {
            Ok(status) => status?,
            Err(_) => {
                tracing::warn!(
                    job_id = %invocation.job_id,
                    timeout_ms = timeout.as_millis(),
                    "engine exceeded deadline, killing"
                );
                // kill() also waits, so the child is reaped when this returns.
                if let Err(e) = child.kill().await {
                    tracing::error!(job_id = %invocation.job_id, error = %e, "failed to kill engine");
                }
                stderr_task.abort();
                return Err(ExecutorError::Timeout { job_id: invocation.job_id, timeout });
            }
        };
        let elapsed = started.elapsed();

        // A grandchild may still hold the pipe open; don't wait on it forever.
        let stderr = match tokio::time::timeout(STDERR_DRAIN, stderr_task).await {
            Ok(Ok(bytes)) => bytes,
            _ => Vec::new(),
        };

        tracing::info!(
            job_id = %invocation.job_id,
            exit_code = ?status.code(),
            elapsed_ms = elapsed.as_millis(),
            "engine exited"
        );

        Ok(EngineOutput { exit_code: status.code(), stderr, elapsed })
    }
}

/// Read `reader` to EOF, keeping at most `limit` bytes.
///
/// Reading continues past the limit so the writer never blocks on a full pipe.
async fn drain_capped<R: AsyncRead + Unpin>(mut reader: R, limit: usize) -> Vec<u8> {
    let mut kept = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = limit.saturating_sub(kept.len());
                kept.extend_from_slice(&chunk[..n.min(room)]);
            }
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_capped_truncates_but_reads_everything() {
        let data = vec![b'x'; 20_000];
        let mut reader = &data[..];
        let kept = drain_capped(&mut reader, 100).await;
        assert_eq!(kept.len(), 100, "output must be capped at the limit");
        assert!(reader.is_empty(), "reader must be drained past the limit");
    }

    #[tokio::test]
    async fn drain_capped_keeps_short_output() {
        let kept = drain_capped(&b"engine says hi"[..], STDERR_LIMIT).await;
        assert_eq!(kept, b"engine says hi");
    }

    #[tokio::test]
    async fn missing_program_is_spawn_failed() {
        let invocation = EngineInvocation::new(
            climgate_core::JobId::new(),
            std::path::PathBuf::from("/nonexistent/climgate-engine"),
            Vec::new(),
            std::env::temp_dir(),
        );
        let result = ProcessEngine::new().run(&invocation, Duration::from_secs(1)).await;
        assert!(
            matches!(result, Err(ExecutorError::SpawnFailed { .. })),
            "spawning a missing binary must be SpawnFailed, got {result:?}"
        );
    }
}
