//! Engine job execution for the climgate gateway.
//!
//! Runs one request at a time per call: an exclusive workspace under the
//! engine's install directory, a CSV input file, a timed engine subprocess and
//! guaranteed cleanup.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod backend;
pub mod config;
pub mod error;
pub mod input;
pub mod process;
pub mod runner;
pub mod workspace;

pub use backend::{EngineBackend, EngineInvocation, EngineOutput};
pub use config::{EngineInstall, EngineRegistry, TimeoutPolicy};
pub use error::ExecutorError;
pub use input::{encode_input, write_input};
pub use process::ProcessEngine;
pub use runner::{compute_hash, JobOutput, JobRequest, JobRunner};
pub use workspace::Workspace;
