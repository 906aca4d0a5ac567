//! Engine backend abstraction trait.
//!
//! Separates job orchestration (workspace, input, output, cleanup) from how
//! the engine is actually launched, so tests can substitute a simulated
//! engine.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use climgate_core::JobId;

use crate::ExecutorError;

/// Everything needed to launch the engine once.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct EngineInvocation {
    /// Job this invocation belongs to.
    pub job_id: JobId,
    /// Executable to run.
    pub program: PathBuf,
    /// Command-line arguments, in order.
    pub args: Vec<String>,
    /// Working directory of the child.
    pub working_dir: PathBuf,
    /// Extra environment for the child only; the gateway's own environment is
    /// never modified.
    pub env: BTreeMap<String, OsString>,
}

impl EngineInvocation {
    /// Build an invocation with an empty environment override.
    #[must_use]
    pub fn new(job_id: JobId, program: PathBuf, args: Vec<String>, working_dir: PathBuf) -> Self {
        Self {
            job_id,
            program,
            args,
            working_dir,
            env: BTreeMap::new(),
        }
    }

    /// Add an environment override.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// How the engine run ended, when it ended on its own.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    /// Exit code, `None` if the child was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard error, possibly truncated.
    pub stderr: Vec<u8>,
    /// Wall-clock run time.
    pub elapsed: Duration,
}

impl EngineOutput {
    /// Returns `true` if the engine exited with status zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Launches the external engine.
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
///
/// # Cancel Safety
/// Implementations must not leave the engine running if the returned future
/// is dropped.
#[async_trait]
pub trait EngineBackend: Send + Sync {
    /// Run the engine to completion or until `timeout` elapses.
    ///
    /// # Errors
    /// Returns [`ExecutorError::SpawnFailed`] if the engine cannot start and
    /// [`ExecutorError::Timeout`] if it runs past `timeout`; in the latter case
    /// the engine has been killed before this returns.
    async fn run(
        &self,
        invocation: &EngineInvocation,
        timeout: Duration,
    ) -> Result<EngineOutput, ExecutorError>;
}

#[async_trait]
impl<T: EngineBackend + ?Sized> EngineBackend for Arc<T> {
    async fn run(
        &self,
        invocation: &EngineInvocation,
        timeout: Duration,
    ) -> Result<EngineOutput, ExecutorError> {
        (**self).run(invocation, timeout).await
    }
}
