//! Engine installations and timeout policy.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ExecutorError;

/// Where one engine variant is installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct EngineInstall {
    /// Install directory; the engine runs with this as its working directory
    /// and job workspaces are created beneath it.
    pub install_dir: PathBuf,

    /// Executable file name inside `install_dir`.
    pub executable: String,
}

impl EngineInstall {
    /// Describe an installation.
    pub fn new(install_dir: impl Into<PathBuf>, executable: impl Into<String>) -> Self {
        Self {
            install_dir: install_dir.into(),
            executable: executable.into(),
        }
    }

    /// Full path of the engine executable.
    #[must_use]
    pub fn program(&self) -> PathBuf {
        self.install_dir.join(&self.executable)
    }
}

/// Variant name to installation mapping (e.g. `bc`, `na`).
#[derive(Debug, Clone, Default)]
pub struct EngineRegistry {
    engines: BTreeMap<String, EngineInstall>,
}

impl EngineRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a variant.
    #[must_use]
    pub fn with(mut self, variant: impl Into<String>, install: EngineInstall) -> Self {
        self.engines.insert(variant.into(), install);
        self
    }

    /// Look up a variant.
    ///
    /// # Errors
    /// Returns [`ExecutorError::UnknownVariant`] if it is not registered.
    pub fn get(&self, variant: &str) -> Result<&EngineInstall, ExecutorError> {
        self.engines
            .get(variant)
            .ok_or_else(|| ExecutorError::UnknownVariant(variant.to_owned()))
    }

    /// Registered variant names, sorted.
    pub fn variants(&self) -> impl Iterator<Item = &str> {
        self.engines.keys().map(String::as_str)
    }
}

/// Wall-clock budget for one engine run: a fixed base plus an increment per
/// submitted location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    /// Budget for an empty batch.
    pub base: Duration,
    /// Added for every location.
    pub per_location: Duration,
}

impl TimeoutPolicy {
    /// Create a policy.
    #[must_use]
    pub const fn new(base: Duration, per_location: Duration) -> Self {
        Self { base, per_location }
    }

    /// Deadline for a batch of `locations` rows. Saturates instead of
    /// overflowing.
    #[must_use]
    pub fn for_locations(&self, locations: usize) -> Duration {
        let count = u32::try_from(locations).unwrap_or(u32::MAX);
        self.base.saturating_add(self.per_location.saturating_mul(count))
    }
}

impl Default for TimeoutPolicy {
    /// 10 s plus 100 ms per location.
    fn default() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_millis(100))
    }
}
