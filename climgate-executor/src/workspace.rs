//! Per-job workspace directories.
//!
//! Each job owns `<install_dir>/api/queries/<job_id>` exclusively. The leaf is
//! created with a non-recursive `create_dir`, so a name collision fails
//! instead of two jobs sharing a directory.

use std::path::{Path, PathBuf};

use climgate_core::JobId;

use crate::ExecutorError;

/// File name of the engine input inside a workspace.
pub const INPUT_FILE: &str = "input.csv";

/// File name the engine is told to write its output to.
pub const OUTPUT_FILE: &str = "out.csv";

/// Query root below an engine install directory.
#[must_use]
pub fn query_root(install_dir: &Path) -> PathBuf {
    install_dir.join("api").join("queries")
}

/// An exclusively owned job directory.
///
/// Call [`remove`](Self::remove) when the job is done. If the workspace is
/// dropped without that (the job future was cancelled), `Drop` removes it
/// synchronously.
#[derive(Debug)]
pub struct Workspace {
    job_id: JobId,
    install_dir: PathBuf,
    relative: PathBuf,
    removed: bool,
}

impl Workspace {
    /// Create the workspace for `job_id` under `install_dir`'s query root.
    ///
    /// # Errors
    /// Returns [`ExecutorError::Workspace`] if the query root cannot be
    /// created or the job directory already exists.
    pub async fn create(install_dir: &Path, job_id: JobId) -> Result<Self, ExecutorError> {
        let root = query_root(install_dir);
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|source| ExecutorError::Workspace { path: root.clone(), source })?;

        let relative = Path::new("api").join("queries").join(job_id.to_string());
        let path = install_dir.join(&relative);
        tokio::fs::create_dir(&path)
            .await
            .map_err(|source| ExecutorError::Workspace { path: path.clone(), source })?;

        tracing::debug!(%job_id, path = %path.display(), "workspace created");

        Ok(Self {
            job_id,
            install_dir: install_dir.to_owned(),
            relative,
            removed: false,
        })
    }

    /// Job owning this workspace.
    #[must_use]
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Absolute path of the workspace directory.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.install_dir.join(&self.relative)
    }

    /// Absolute path of the input file.
    #[must_use]
    pub fn input_path(&self) -> PathBuf {
        self.path().join(INPUT_FILE)
    }

    /// Absolute path of the output file.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        self.path().join(OUTPUT_FILE)
    }

    /// Input path relative to the install directory, as the engine sees it.
    #[must_use]
    pub fn relative_input(&self) -> PathBuf {
        self.relative.join(INPUT_FILE)
    }

    /// Output path relative to the install directory, as the engine sees it.
    #[must_use]
    pub fn relative_output(&self) -> PathBuf {
        self.relative.join(OUTPUT_FILE)
    }

    /// Delete the workspace and everything in it.
    ///
    /// # Errors
    /// Returns the I/O error if the directory exists but cannot be removed.
    pub async fn remove(mut self) -> Result<(), std::io::Error> {
        self.removed = true;
        match tokio::fs::remove_dir_all(self.path()).await {
            Ok(()) => {
                tracing::debug!(job_id = %self.job_id, "workspace removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        let job_id = self.job_id;
        let path = self.path();
        // Inside a runtime the recursive delete goes to the blocking pool.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || remove_abandoned(job_id, &path));
            }
            Err(_) => remove_abandoned(job_id, &path),
        }
    }
}

fn remove_abandoned(job_id: JobId, path: &Path) {
    match std::fs::remove_dir_all(path) {
        Ok(()) => tracing::debug!(%job_id, "abandoned workspace removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            %job_id,
            path = %path.display(),
            error = %e,
            "failed to remove abandoned workspace"
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn install_dir() -> tempfile::TempDir {
        match tempfile::tempdir() {
            Ok(d) => d,
            Err(e) => panic!("tempdir: {e}"),
        }
    }

    #[tokio::test]
    async fn create_lays_out_query_root_and_relative_paths() {
        let dir = install_dir();
        let job_id = JobId::new();
        let ws = match Workspace::create(dir.path(), job_id).await {
            Ok(w) => w,
            Err(e) => panic!("create failed: {e}"),
        };

        assert!(ws.path().is_dir(), "workspace directory must exist");
        assert_eq!(ws.path(), query_root(dir.path()).join(job_id.to_string()));
        assert_eq!(
            ws.relative_input(),
            Path::new("api").join("queries").join(job_id.to_string()).join(INPUT_FILE)
        );
        assert_eq!(dir.path().join(ws.relative_output()), ws.output_path());
    }

    #[tokio::test]
    async fn same_job_id_twice_is_rejected() {
        let dir = install_dir();
        let job_id = JobId::new();
        let first = match Workspace::create(dir.path(), job_id).await {
            Ok(w) => w,
            Err(e) => panic!("create failed: {e}"),
        };
        let second = Workspace::create(dir.path(), job_id).await;
        assert!(
            matches!(second, Err(ExecutorError::Workspace { .. })),
            "a colliding workspace must not be shared"
        );
        drop(first);
    }

    #[tokio::test]
    async fn remove_deletes_directory_and_contents() {
        let dir = install_dir();
        let ws = match Workspace::create(dir.path(), JobId::new()).await {
            Ok(w) => w,
            Err(e) => panic!("create failed: {e}"),
        };
        let path = ws.path();
        if let Err(e) = tokio::fs::write(ws.output_path(), b"a,b\n").await {
            panic!("write failed: {e}");
        }
        if let Err(e) = ws.remove().await {
            panic!("remove failed: {e}");
        }
        assert!(!path.exists(), "workspace must be gone after remove");
    }

    #[tokio::test]
    async fn drop_without_remove_cleans_up() {
        let dir = install_dir();
        let ws = match Workspace::create(dir.path(), JobId::new()).await {
            Ok(w) => w,
            Err(e) => panic!("create failed: {e}"),
        };
        let path = ws.path();
        drop(ws);

        let mut waited = 0;
        while path.exists() {
            assert!(waited < 200, "dropped workspace must be removed");
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            waited += 1;
        }
    }

    #[test]
    fn drop_outside_a_runtime_removes_at_once() {
        let dir = install_dir();
        let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(e) => panic!("runtime: {e}"),
        };
        let ws = match rt.block_on(Workspace::create(dir.path(), JobId::new())) {
            Ok(w) => w,
            Err(e) => panic!("create failed: {e}"),
        };
        let path = ws.path();
        assert!(path.is_dir());
        drop(ws);
        assert!(!path.exists(), "drop with no runtime must remove synchronously");
    }

    #[tokio::test]
    async fn create_fails_when_install_dir_is_a_file() {
        let dir = install_dir();
        let file = dir.path().join("not-a-dir");
        if let Err(e) = std::fs::write(&file, b"x") {
            panic!("write failed: {e}");
        }
        let result = Workspace::create(&file, JobId::new()).await;
        assert!(matches!(result, Err(ExecutorError::Workspace { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_workspaces_never_share_a_path() {
        let dir = install_dir();
        let root = dir.path().to_owned();

        let handles: Vec<_> = (0..256)
            .map(|_| {
                let root = root.clone();
                tokio::spawn(async move { Workspace::create(&root, JobId::new()).await })
            })
            .collect();

        let mut workspaces = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(Ok(ws)) => workspaces.push(ws),
                Ok(Err(e)) => panic!("create failed: {e}"),
                Err(e) => panic!("task panicked: {e}"),
            }
        }

        let paths: HashSet<PathBuf> = workspaces.iter().map(Workspace::path).collect();
        assert_eq!(paths.len(), 256, "every concurrent job must get its own workspace");
    }
}
