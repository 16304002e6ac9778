use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::jobs::domain::job::JobId;

/// Filesystem namespace for job outputs: `root/<job_id>/<file>`.
///
/// Jobs never share a directory, so nothing here locks. Every delete
/// tolerates the file being gone already, since the reaper and a consuming
/// fetch can race over the same paths.
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn job_dir(&self, id: &JobId) -> PathBuf {
        self.root.join(id.as_str())
    }

    pub fn create_job_dir(&self, id: &JobId) -> io::Result<PathBuf> {
        let dir = self.job_dir(id);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Deletes `paths`, then removes each parent directory that became empty.
    ///
    /// Returns the number of files actually removed.
    pub fn remove_paths(&self, paths: &[&Path]) -> usize {
        let mut removed = 0;
        let mut parents = BTreeSet::new();
        for path in paths {
            if let Some(parent) = path.parent() {
                parents.insert(parent.to_path_buf());
            }
            match remove_file_if_exists(path) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => log::warn!("Could not remove {}: {e}", path.display()),
            }
        }

        for parent in parents {
            if parent == self.root {
                continue;
            }
            if let Err(e) = fs::remove_dir(&parent) {
                log::debug!("Keeping {}: {e}", parent.display());
            }
        }
        removed
    }

    /// Removes a job directory and everything in it, if present.
    pub fn discard_job_dir(&self, id: &JobId) {
        let dir = self.job_dir(id);
        if let Err(e) = fs::remove_dir_all(&dir) {
            if e.kind() != io::ErrorKind::NotFound {
                log::warn!("Could not remove {}: {e}", dir.display());
            }
        }
    }
}

/// `Ok(false)` when there was nothing to delete.
pub fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
