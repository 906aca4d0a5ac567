use crate::job::JobState;

/// Errors produced by the `climgate-core` crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CoreError {
    /// A location record field is not finite or out of its valid range.
    #[error("invalid location '{id1}/{id2}': {field} = {value} is out of range")]
    InvalidLocation {
        id1: String,
        id2: String,
        field: &'static str,
        value: f64,
    },

    /// The reference dataset name is empty or contains path components.
    #[error("invalid reference dataset '{0}': must be a bare file name")]
    InvalidReferenceDataset(String),

    /// A job tried to move between states the lifecycle does not allow.
    #[error("illegal job transition {from:?} -> {to:?}")]
    IllegalTransition { from: JobState, to: JobState },
}
