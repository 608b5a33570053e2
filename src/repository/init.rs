//! On-demand creation of bare repositories
//!
//! A repository that the policy grants access to but which does not exist
//! yet is created the first time someone is allowed to use it. Sessions race
//! for this, so creation runs under a lock and lands via rename. A new
//! repository keeps a marker file until its first-time setup succeeds.

use crate::util::{FileLock, mkdir_all, remove_if_exists};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Something that can lay down an empty bare repository
pub trait RepositoryInitializer {
    fn init_bare(&self, path: &Path) -> io::Result<()>;
}

impl<T: RepositoryInitializer + ?Sized> RepositoryInitializer for &T {
    fn init_bare(&self, path: &Path) -> io::Result<()> {
        (**self).init_bare(path)
    }
}

/// Runs `git init --bare`
#[derive(Debug, Clone)]
pub struct GitInitializer {
    program: String,
}

impl GitInitializer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GitInitializer {
    fn default() -> Self {
        Self::new("git")
    }
}

impl RepositoryInitializer for GitInitializer {
    fn init_bare(&self, path: &Path) -> io::Result<()> {
        let output = Command::new(&self.program)
            .args(["init", "--bare", "--quiet"])
            .arg(path)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(io::Error::other(format!(
                "{} init failed: {}",
                self.program,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Marker present inside a repository until its first-time setup succeeds
pub const SETUP_PENDING_FILE: &str = "gitward-setup-pending";

/// Whether the repository at `target` still needs its first-time setup
pub fn setup_pending(target: &Path) -> bool {
    target.join(SETUP_PENDING_FILE).exists()
}

/// Exclusive hold on creating and setting up one repository.
///
/// Backed by `<target>.lock` in the storage root. The lock file stays there
/// after release; removing it could let two sessions lock different files.
#[derive(Debug)]
pub struct RepositoryGuard {
    target: PathBuf,
    _lock: FileLock,
}

/// Lock `target` for creation, creating leading directories as needed
pub fn lock_repository(target: &Path) -> io::Result<RepositoryGuard> {
    let parent = target
        .parent()
        .ok_or_else(|| io::Error::other("repository path has no parent directory"))?;
    mkdir_all(parent)?;

    Ok(RepositoryGuard {
        target: target.to_path_buf(),
        _lock: FileLock::for_artifact(target)?,
    })
}

impl RepositoryGuard {
    pub fn path(&self) -> &Path {
        &self.target
    }

    /// Create the bare repository unless it already exists.
    ///
    /// Returns `true` if this call created it. The repository is initialized
    /// in a staging directory, marked as pending setup, then renamed into
    /// place.
    pub fn create(&self, initializer: &dyn RepositoryInitializer) -> io::Result<bool> {
        let target = &self.target;
        if target.exists() {
            debug!(path = %target.display(), "Repository appeared while waiting for lock");
            return Ok(false);
        }

        let staging = crate::util::temp_sibling(target);
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }

        let created = initializer
            .init_bare(&staging)
            .and_then(|()| fs::write(staging.join(SETUP_PENDING_FILE), b""))
            .and_then(|()| fs::rename(&staging, target));

        if let Err(e) = created {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        info!(path = %target.display(), "Bare repository initialized");
        Ok(true)
    }

    pub fn setup_pending(&self) -> bool {
        setup_pending(&self.target)
    }

    /// Record that first-time setup completed
    pub fn finish_setup(&self) -> io::Result<()> {
        remove_if_exists(&self.target.join(SETUP_PENDING_FILE))
    }
}
