//! Error types for the executor crate.

use std::path::PathBuf;
use std::time::Duration;

use climgate_core::JobId;

/// Errors that can occur while running an engine job.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ExecutorError {
    /// No engine installation is configured under this variant name.
    #[error("unknown variant '{0}'")]
    UnknownVariant(String),

    /// The job's workspace directory could not be created.
    #[error("workspace {path} could not be created: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The location rows could not be encoded as CSV.
    #[error("input serialization failed: {0}")]
    InputSerialization(String),

    /// The engine process could not be started.
    #[error("engine {program} failed to start: {reason}")]
    SpawnFailed { program: PathBuf, reason: String },

    /// The engine exceeded its deadline and was killed.
    #[error("job {job_id} timed out after {}ms", timeout.as_millis())]
    Timeout { job_id: JobId, timeout: Duration },

    /// The engine exited with a non-zero status.
    #[error("job {job_id} engine exited with {code:?}")]
    EngineFailed {
        job_id: JobId,
        code: Option<i32>,
        stderr: String,
    },

    /// The engine exited zero but left no output file.
    #[error("engine output missing at {path}")]
    OutputMissing { path: PathBuf },

    /// Underlying I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
