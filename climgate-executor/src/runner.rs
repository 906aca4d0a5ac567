//! Job runner: executes one compute request against an engine installation.
//!
//! The runner:
//! 1. Resolves the variant to an installation
//! 2. Creates the job's exclusive workspace
//! 3. Writes the input CSV
//! 4. Runs the engine through the configured backend under a deadline
//! 5. Reads the output file back and hashes it
//! 6. Removes the workspace, on success and on every failure path
//!
//! See [`JobState`] for the lifecycle this walks through.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use climgate_core::{ContentHash, JobId, JobState, Location, Mode, ReferenceDataset};

use crate::backend::{EngineBackend, EngineInvocation};
use crate::config::{EngineInstall, EngineRegistry, TimeoutPolicy};
use crate::input::write_input;
use crate::workspace::Workspace;
use crate::ExecutorError;

/// Environment variables pointed at the scratch directory for the engine.
const TEMP_VARS: [&str; 3] = ["TMP", "TEMP", "TMPDIR"];

/// One compute request, already validated.
#[derive(Debug, Clone, Default)]
pub struct JobRequest {
    /// Output period selection.
    pub mode: Mode,
    /// Normal-period dataset the engine should use.
    pub reference_dataset: ReferenceDataset,
    /// Sites to evaluate, in output order.
    pub locations: Vec<Location>,
}

/// A finished job's result.
#[derive(Debug, Clone)]
pub struct JobOutput {
    /// The job that produced this output.
    pub job_id: JobId,
    /// Contents of the engine's output file.
    pub bytes: Vec<u8>,
    /// SHA-256 of `bytes`.
    pub output_hash: ContentHash,
    /// Wall-clock time from workspace creation to output read.
    pub elapsed: Duration,
}

impl JobOutput {
    /// Download name for the result file.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}_out.csv", self.job_id)
    }
}

/// Runs engine jobs in isolated workspaces.
///
/// # Cancel Safety
/// Cancel safe. Dropping the future kills the engine (through the backend)
/// and removes the workspace (through its drop guard).
pub struct JobRunner<B: EngineBackend> {
    backend: B,
    engines: EngineRegistry,
    timeouts: TimeoutPolicy,
    scratch_dir: Option<PathBuf>,
}

impl<B: EngineBackend> JobRunner<B> {
    /// Create a runner with the default timeout policy and no scratch
    /// directory override.
    #[must_use]
    pub fn new(backend: B, engines: EngineRegistry) -> Self {
        Self {
            backend,
            engines,
            timeouts: TimeoutPolicy::default(),
            scratch_dir: None,
        }
    }

    /// Replace the timeout policy.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: TimeoutPolicy) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Direct the engine's temp files into `dir`.
    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Configured installations.
    #[must_use]
    pub fn engines(&self) -> &EngineRegistry {
        &self.engines
    }

    /// Execute one job for `variant`.
    ///
    /// # Errors
    /// Returns [`ExecutorError::UnknownVariant`] for an unregistered variant,
    /// [`ExecutorError::Workspace`] / [`ExecutorError::Io`] /
    /// [`ExecutorError::InputSerialization`] / [`ExecutorError::OutputMissing`]
    /// for resource failures, [`ExecutorError::SpawnFailed`] if the engine
    /// cannot start, [`ExecutorError::Timeout`] if it overruns and
    /// [`ExecutorError::EngineFailed`] if it exits non-zero.
    pub async fn execute(
        &self,
        variant: &str,
        request: &JobRequest,
    ) -> Result<JobOutput, ExecutorError> {
        let install = self.engines.get(variant)?;
        let job_id = JobId::new();
        let timeout = self.timeouts.for_locations(request.locations.len());
        let wall_start = Instant::now();

        tracing::info!(
            %job_id,
            %variant,
            locations = request.locations.len(),
            mode = %request.mode,
            reference_dataset = %request.reference_dataset,
            "starting job"
        );

        let workspace = Workspace::create(&install.install_dir, job_id).await?;
        let mut state = advance(job_id, JobState::Created, JobState::WorkspacePrepared);

        let result = self.run_in(install, &workspace, request, timeout, &mut state).await;

        if let Err(e) = workspace.remove().await {
            tracing::error!(%job_id, error = %e, "failed to remove workspace");
        }
        advance(job_id, state, JobState::Cleaned);

        let bytes = result?;
        let elapsed = wall_start.elapsed();
        let output_hash = compute_hash(&bytes);

        tracing::info!(
            %job_id,
            %variant,
            output_hash = %output_hash,
            bytes = bytes.len(),
            elapsed_ms = elapsed.as_millis(),
            "job complete"
        );

        Ok(JobOutput { job_id, bytes, output_hash, elapsed })
    }

    async fn run_in(
        &self,
        install: &EngineInstall,
        workspace: &Workspace,
        request: &JobRequest,
        timeout: Duration,
        state: &mut JobState,
    ) -> Result<Vec<u8>, ExecutorError> {
        let job_id = workspace.job_id();

        write_input(&workspace.input_path(), &request.locations).await?;
        *state = advance(job_id, *state, JobState::InputWritten);

        let invocation = self.invocation(install, workspace, request);
        *state = advance(job_id, *state, JobState::EngineRunning);

        let output = match self.backend.run(&invocation, timeout).await {
            Ok(output) => output,
            Err(e @ ExecutorError::Timeout { .. }) => {
                *state = advance(job_id, *state, JobState::TimedOut);
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        if !output.success() {
            *state = advance(job_id, *state, JobState::EngineFailed);
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            tracing::error!(
                %job_id,
                exit_code = ?output.exit_code,
                %stderr,
                "engine failed"
            );
            return Err(ExecutorError::EngineFailed { job_id, code: output.exit_code, stderr });
        }

        let output_path = workspace.output_path();
        let bytes = tokio::fs::read(&output_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ExecutorError::OutputMissing { path: output_path.clone() }
            } else {
                ExecutorError::Io(e)
            }
        })?;
        *state = advance(job_id, *state, JobState::Succeeded);

        Ok(bytes)
    }

    fn invocation(
        &self,
        install: &EngineInstall,
        workspace: &Workspace,
        request: &JobRequest,
    ) -> EngineInvocation {
        let args = vec![
            engine_arg(request.mode.as_flag()),
            engine_arg(request.reference_dataset.as_str()),
            engine_arg(&workspace.relative_input().to_string_lossy()),
            engine_arg(&workspace.relative_output().to_string_lossy()),
        ];

        let mut invocation = EngineInvocation::new(
            workspace.job_id(),
            install.program(),
            args,
            install.install_dir.clone(),
        );
        if let Some(dir) = &self.scratch_dir {
            for var in TEMP_VARS {
                invocation = invocation.with_env(var, OsString::from(dir.as_os_str()));
            }
        }
        invocation
    }
}

/// Compute the SHA-256 of an engine output.
///
/// # Complexity
/// O(n) in the output length.
#[must_use]
pub fn compute_hash(bytes: &[u8]) -> ContentHash {
    let digest = Sha256::digest(bytes);
    ContentHash::new(digest.into())
}

/// The engine takes every argument as a `/`-prefixed switch.
fn engine_arg(value: &str) -> String {
    format!("/{value}")
}

fn advance(job_id: JobId, from: JobState, to: JobState) -> JobState {
    match from.advance(to) {
        Ok(next) => {
            tracing::debug!(%job_id, ?from, ?to, "job state");
            next
        }
        Err(e) => {
            tracing::error!(%job_id, error = %e, "job lifecycle violated");
            to
        }
    }
}
