//! Published project list for gitweb
//!
//! `projects.list` names one repository per line, relative to the
//! repository root. Point gitweb's `$projects_list` at it.

use crate::util::{FileLock, mkdir_all, replace_file};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the published list inside the generated-files directory
pub const PROJECT_LIST_FILE: &str = "projects.list";

#[derive(Debug, Clone)]
pub struct ProjectList {
    path: PathBuf,
}

impl ProjectList {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current entries, empty if the list has never been published
    pub fn entries(&self) -> io::Result<Vec<String>> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Merge changes into the published list.
    ///
    /// Entries in `deny` are dropped, entries in `allow` are appended unless
    /// already present; everything else keeps its position.
    pub fn update(&self, allow: &[String], deny: &[String]) -> io::Result<()> {
        self.publish(|existing| {
            let mut entries: Vec<String> = existing
                .into_iter()
                .filter(|entry| !deny.contains(entry))
                .collect();
            for entry in allow {
                if !entries.contains(entry) {
                    entries.push(entry.clone());
                }
            }
            entries
        })
    }

    /// Replace the published list with exactly `allow`
    pub fn refresh(&self, allow: &[String]) -> io::Result<()> {
        self.publish(|_| allow.to_vec())
    }

    fn publish(&self, merge: impl FnOnce(Vec<String>) -> Vec<String>) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            mkdir_all(parent)?;
        }

        let _lock = FileLock::for_artifact(&self.path)?;
        let entries = merge(self.entries()?);

        let mut text = entries.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        replace_file(&self.path, text.as_bytes())?;

        debug!(path = %self.path.display(), entries = entries.len(), "Published project list");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_update_creates_list() {
        let dir = tempfile::tempdir().unwrap();
        let list = ProjectList::new(dir.path().join("gen").join(PROJECT_LIST_FILE));

        list.update(&strings(&["a.git"]), &[]).unwrap();
        assert_eq!(fs::read_to_string(list.path()).unwrap(), "a.git\n");
    }

    #[test]
    fn test_update_merges() {
        let dir = tempfile::tempdir().unwrap();
        let list = ProjectList::new(dir.path().join(PROJECT_LIST_FILE));
        fs::write(list.path(), "a.git\nb.git\n\nc.git\n").unwrap();

        list.update(&strings(&["b.git", "d.git"]), &strings(&["a.git"]))
            .unwrap();

        assert_eq!(
            list.entries().unwrap(),
            strings(&["b.git", "c.git", "d.git"])
        );
    }

    #[test]
    fn test_refresh_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let list = ProjectList::new(dir.path().join(PROJECT_LIST_FILE));
        fs::write(list.path(), "old.git\n").unwrap();

        list.refresh(&strings(&["new.git"])).unwrap();
        assert_eq!(list.entries().unwrap(), strings(&["new.git"]));

        list.refresh(&[]).unwrap();
        assert_eq!(fs::read_to_string(list.path()).unwrap(), "");
    }

    #[test]
    fn test_missing_list_has_no_entries() {
        let dir = tempfile::tempdir().unwrap();
        let list = ProjectList::new(dir.path().join(PROJECT_LIST_FILE));
        assert!(list.entries().unwrap().is_empty());
    }
}
