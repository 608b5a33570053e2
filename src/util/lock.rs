//! Advisory file locks for shared derived files.
//!
//! Sessions run as separate processes; a lock file next to the artifact
//! serializes updates to it. Only one lock is held at a time.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// An exclusive lock, released on drop.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Block until an exclusive lock on `path` is held.
    ///
    /// The lock file is created if needed and left in place afterwards.
    pub fn exclusive(path: &Path) -> io::Result<Self> {
        debug!(path = %path.display(), "Locking");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        file.lock_exclusive()?;
        debug!(path = %path.display(), "Locked");

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Lock file for an artifact: `<artifact>.lock`
    pub fn for_artifact(artifact: &Path) -> io::Result<Self> {
        let mut name = artifact.as_os_str().to_os_string();
        name.push(".lock");
        Self::exclusive(Path::new(&name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), "Unlock");
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("projects.list");

        let lock = FileLock::for_artifact(&artifact).unwrap();
        assert_eq!(lock.path(), dir.path().join("projects.list.lock"));
        assert!(lock.path().exists());
    }

    #[test]
    fn test_relock_after_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.lock");

        drop(FileLock::exclusive(&path).unwrap());
        let again = FileLock::exclusive(&path);
        assert!(again.is_ok());
    }

    #[test]
    fn test_second_lock_is_refused_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.lock");

        let _held = FileLock::exclusive(&path).unwrap();
        let other = OpenOptions::new().write(true).open(&path).unwrap();
        assert!(other.try_lock_exclusive().is_err());
    }
}
