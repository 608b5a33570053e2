//! Utility functions shared across the application.

mod lock;

pub use lock::FileLock;

use nix::libc::mode_t;
use nix::sys::stat::{Mode, umask};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Umask for a serving session: repositories stay readable by gitweb and
/// `git daemon`
pub const SESSION_UMASK: mode_t = 0o022;

/// Set the process umask to [`SESSION_UMASK`], returning the previous one
pub fn apply_session_umask() -> mode_t {
    umask(Mode::from_bits_truncate(SESSION_UMASK)).bits()
}

/// Create a directory and all its parents.
///
/// A directory that already exists, possibly created by a concurrent
/// session, counts as success. Permissions follow the process umask.
pub fn mkdir_all(path: &Path) -> io::Result<()> {
    fs::DirBuilder::new().recursive(true).create(path)
}

/// Sibling path used while a file is being replaced
pub fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}

/// Replace a file's contents atomically.
///
/// The data is written to a temporary sibling first and renamed over the
/// target, so readers see either the old or the new file, never a mix.
pub fn replace_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    let tmp = temp_sibling(path);

    let written = fs::File::create(&tmp).and_then(|mut file| {
        file.write_all(contents)?;
        file.sync_all()
    });

    match written.and_then(|()| fs::rename(&tmp, path)) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}

/// Remove a file, treating an already missing file as success
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Resolve a configured path: tilde-expanded, relative paths under `base`
pub fn resolve_path(base: &Path, configured: &str) -> PathBuf {
    let expanded = shellexpand::tilde(configured);
    base.join(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn test_session_umask() {
        let original = apply_session_umask();
        assert_eq!(apply_session_umask(), SESSION_UMASK);

        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("shared/repo.git");
        mkdir_all(&nested).unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&nested).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }

        umask(Mode::from_bits_truncate(original));
    }

    #[test]
    fn test_mkdir_all_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        mkdir_all(&nested).unwrap();
        mkdir_all(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_replace_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("description");

        replace_file(&path, b"first\n").unwrap();
        replace_file(&path, b"second\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second\n");
        assert!(!temp_sibling(&path).exists());
    }

    #[test]
    fn test_replace_file_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing/description");
        assert!(replace_file(&path, b"x").is_err());
    }

    #[test]
    fn test_remove_if_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("marker");
        remove_if_exists(&path).unwrap();
        fs::write(&path, "").unwrap();
        remove_if_exists(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_resolve_path() {
        let base = Path::new("/home/git");
        assert_eq!(
            resolve_path(base, "repositories"),
            PathBuf::from("/home/git/repositories")
        );
        assert_eq!(resolve_path(base, "/srv/git"), PathBuf::from("/srv/git"));
    }
}
