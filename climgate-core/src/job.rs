use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Lifecycle of a single compute job.
///
/// ```text
/// Created -> WorkspacePrepared -> InputWritten -> EngineRunning
///         -> {Succeeded | TimedOut | EngineFailed} -> Cleaned
/// ```
///
/// Any state after `Created` may also jump straight to `Cleaned` when an I/O
/// step fails; every job that got a workspace must end in `Cleaned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum JobState {
    /// Accepted, nothing on disk yet.
    Created,
    /// Exclusive workspace directory exists.
    WorkspacePrepared,
    /// Input file written into the workspace.
    InputWritten,
    /// Engine subprocess spawned and being awaited.
    EngineRunning,
    /// Engine exited zero and the output was read back.
    Succeeded,
    /// Engine exceeded its deadline and was killed.
    TimedOut,
    /// Engine exited non-zero.
    EngineFailed,
    /// Workspace removed.
    Cleaned,
}

impl JobState {
    /// Returns `true` if the lifecycle allows moving from `self` to `next`.
    #[must_use]
    pub const fn can_advance_to(self, next: JobState) -> bool {
        use JobState::{
            Cleaned, Created, EngineFailed, EngineRunning, InputWritten, Succeeded, TimedOut,
            WorkspacePrepared,
        };
        matches!(
            (self, next),
            (Created, WorkspacePrepared)
                | (WorkspacePrepared, InputWritten)
                | (InputWritten, EngineRunning)
                | (EngineRunning, Succeeded | TimedOut | EngineFailed)
                | (
                    WorkspacePrepared
                        | InputWritten
                        | EngineRunning
                        | Succeeded
                        | TimedOut
                        | EngineFailed,
                    Cleaned
                )
        )
    }

    /// Moves to `next`, rejecting transitions the lifecycle does not allow.
    ///
    /// # Errors
    /// Returns [`CoreError::IllegalTransition`] for a disallowed move.
    pub fn advance(self, next: JobState) -> Result<JobState, CoreError> {
        if self.can_advance_to(next) {
            Ok(next)
        } else {
            Err(CoreError::IllegalTransition { from: self, to: next })
        }
    }

    /// Returns `true` for the engine outcomes that precede cleanup.
    #[must_use]
    pub const fn is_outcome(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::TimedOut | JobState::EngineFailed)
    }
}
