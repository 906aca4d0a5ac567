//! Core types for the climgate engine gateway.
//!
//! Defines the domain shared by the executor and the HTTP layer: job and
//! content identifiers, location records, engine modes and reference
//! datasets, and the job lifecycle.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod id;
pub mod job;
pub mod location;

pub use error::CoreError;
pub use id::{ContentHash, JobId};
pub use job::JobState;
pub use location::{
    Location, Mode, ReferenceDataset, DEFAULT_REFERENCE_DATASET, INPUT_HEADER,
};
