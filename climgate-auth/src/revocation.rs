//! Revocation stores.
//!
//! Membership is monotonic: an id, once revoked, stays revoked for the life
//! of the store. [`MemoryRevocations`] forgets everything on restart;
//! [`FileRevocations`] appends each new id to a file and reloads it at open.
//! Ids are stored as JSON strings, one per line, so an id holding a newline
//! or surrounding whitespace reloads exactly as it was revoked.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashSet;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::AuthError;

/// Set of revoked token ids.
///
/// Lookups are synchronous and lock-free so the verify path never waits on a
/// concurrent revocation.
#[async_trait]
pub trait RevocationStore: Send + Sync + fmt::Debug {
    /// Add `jti` to the set. Returns `true` if it was not already present.
    ///
    /// # Errors
    /// Returns [`AuthError::Store`] if a persistent store cannot record the id.
    async fn revoke(&self, jti: &str) -> Result<bool, AuthError>;

    /// Returns `true` if `jti` has been revoked.
    fn is_revoked(&self, jti: &str) -> bool;

    /// Number of revoked ids.
    fn len(&self) -> usize;

    /// Returns `true` if nothing has been revoked.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local revocation set. Lost on restart.
#[derive(Debug, Default)]
pub struct MemoryRevocations {
    revoked: DashSet<String>,
}

impl MemoryRevocations {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocations {
    async fn revoke(&self, jti: &str) -> Result<bool, AuthError> {
        Ok(self.revoked.insert(jti.to_owned()))
    }

    fn is_revoked(&self, jti: &str) -> bool {
        self.revoked.contains(jti)
    }

    fn len(&self) -> usize {
        self.revoked.len()
    }
}

/// Append-only file of revoked ids, one JSON string per line.
///
/// The in-memory set is authoritative for lookups; the file only makes
/// revocations survive a restart.
#[derive(Debug)]
pub struct FileRevocations {
    path: PathBuf,
    revoked: DashSet<String>,
    append: Mutex<()>,
}

impl FileRevocations {
    /// Open (or create) the revocation file and load every id it lists.
    ///
    /// # Errors
    /// Returns [`AuthError::Store`] if the file exists but cannot be read, or
    /// its parent directory cannot be created.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, AuthError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let revoked = DashSet::new();
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                for (n, line) in contents.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<String>(line) {
                        Ok(jti) => {
                            revoked.insert(jti);
                        }
                        Err(e) => {
                            // Keep the raw text revoked rather than dropping it.
                            tracing::warn!(
                                path = %path.display(),
                                line = n + 1,
                                error = %e,
                                "revocation entry is not a JSON string, loading it verbatim"
                            );
                            revoked.insert(line.trim().to_owned());
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            path = %path.display(),
            loaded = revoked.len(),
            "revocation file opened"
        );

        Ok(Self { path, revoked, append: Mutex::new(()) })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RevocationStore for FileRevocations {
    async fn revoke(&self, jti: &str) -> Result<bool, AuthError> {
        if self.revoked.contains(jti) {
            return Ok(false);
        }

        // Serialize appends so concurrent revocations of one id write it once.
        let _guard = self.append.lock().await;
        if self.revoked.contains(jti) {
            return Ok(false);
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let mut entry = serde_json::to_string(jti).map_err(std::io::Error::from)?;
        entry.push('\n');
        file.write_all(entry.as_bytes()).await?;
        file.sync_data().await?;

        Ok(self.revoked.insert(jti.to_owned()))
    }

    fn is_revoked(&self, jti: &str) -> bool {
        self.revoked.contains(jti)
    }

    fn len(&self) -> usize {
        self.revoked.len()
    }
}
