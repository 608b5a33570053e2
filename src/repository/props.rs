//! Per-repository property triggers
//!
//! After a repository is created, each trigger receives the value the policy
//! decides for it (from the repository's section, else the global section
//! for triggers that inherit one) and updates the repository's side files.

use crate::error::{PolicyError, TriggerError};
use crate::policy::{PolicyDocument, parse_bool};
use crate::repository::project_list::{PROJECT_LIST_FILE, ProjectList};
use crate::util::{remove_if_exists, replace_file, resolve_path};
use std::cell::RefCell;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Marker file that lets `git daemon` export a repository
pub const DAEMON_EXPORT_FILE: &str = "git-daemon-export-ok";

/// Default directory for generated files, relative to home
pub const DEFAULT_GENERATED_DIR: &str = "gitosis";

/// A repository property driven by the policy
pub trait PropertyTrigger {
    /// Option name read from the policy
    fn name(&self) -> &'static str;

    /// Fallback when the repository's section leaves the option unset.
    ///
    /// `Some` makes the global section's option the next source, then this
    /// value; `None` skips the trigger for unset repositories.
    fn global_default(&self) -> Option<&'static str> {
        None
    }

    fn apply(&self, repo_root: &Path, logical_name: &str, value: &str) -> Result<(), TriggerError>;

    /// Called once after every trigger has been applied
    fn flush(&self) -> Result<(), TriggerError> {
        Ok(())
    }

    /// Drop state collected by `apply` when the run is abandoned before flush
    fn discard(&self) {}
}

fn repo_dir(repo_root: &Path, logical_name: &str) -> PathBuf {
    repo_root.join(format!("{logical_name}.git"))
}

fn io_error(trigger: &'static str, path: &Path) -> impl FnOnce(io::Error) -> TriggerError {
    let path = path.to_path_buf();
    move |source| TriggerError::Io {
        trigger,
        path,
        source,
    }
}

fn enable_flag(trigger: &'static str, logical_name: &str, value: &str) -> Result<bool, TriggerError> {
    parse_bool(value).ok_or_else(|| {
        TriggerError::Policy(PolicyError::InvalidBoolean {
            section: logical_name.to_string(),
            option: trigger.to_string(),
            value: value.to_string(),
        })
    })
}

/// Decide the value for one trigger
pub fn decide_value(
    policy: &PolicyDocument,
    section: &str,
    trigger: &dyn PropertyTrigger,
) -> Result<Option<String>, PolicyError> {
    if let Some(value) = policy.repo_scalar(section, trigger.name())? {
        return Ok(Some(value));
    }
    Ok(trigger.global_default().map(|default| {
        policy
            .global_get(trigger.name())
            .unwrap_or(default)
            .to_string()
    }))
}

/// Run every trigger for one repository, then flush them
pub fn run_triggers(
    policy: &PolicyDocument,
    triggers: &[Box<dyn PropertyTrigger>],
    repo_root: &Path,
    logical_name: &str,
) -> Result<(), TriggerError> {
    let section = policy
        .lookup_repo_by_path(logical_name)?
        .unwrap_or(logical_name)
        .to_string();
    trace!(logical_name, section = %section, "Running property triggers");

    if let Err(e) = apply_all(policy, triggers, repo_root, logical_name, &section) {
        for trigger in triggers {
            trigger.discard();
        }
        return Err(e);
    }

    for trigger in triggers {
        trigger.flush()?;
    }
    Ok(())
}

fn apply_all(
    policy: &PolicyDocument,
    triggers: &[Box<dyn PropertyTrigger>],
    repo_root: &Path,
    logical_name: &str,
    section: &str,
) -> Result<(), TriggerError> {
    for trigger in triggers {
        match decide_value(policy, section, trigger.as_ref())? {
            Some(value) => {
                debug!(trigger = trigger.name(), logical_name, value = %value, "Applying");
                trigger.apply(repo_root, logical_name, &value)?;
            }
            None => trace!(trigger = trigger.name(), logical_name, "Unset, skipping"),
        }
    }
    Ok(())
}

/// Directory holding generated files such as `projects.list`
pub fn generated_files_dir(policy: &PolicyDocument, home: &Path) -> PathBuf {
    match policy.global_get("generate-files-in") {
        Some(dir) => resolve_path(home, dir),
        None => home.join(DEFAULT_GENERATED_DIR),
    }
}

/// The built-in triggers, in the order they run
pub fn default_triggers(policy: &PolicyDocument, home: &Path) -> Vec<Box<dyn PropertyTrigger>> {
    let list = ProjectList::new(generated_files_dir(policy, home).join(PROJECT_LIST_FILE));
    vec![
        Box::new(DaemonTrigger),
        Box::new(GitwebTrigger::new(list)),
        Box::new(DescriptionTrigger),
        Box::new(OwnerTrigger),
    ]
}

/// Toggles the `git daemon` export marker
#[derive(Debug, Default)]
pub struct DaemonTrigger;

impl PropertyTrigger for DaemonTrigger {
    fn name(&self) -> &'static str {
        "daemon"
    }

    fn global_default(&self) -> Option<&'static str> {
        Some("no")
    }

    fn apply(&self, repo_root: &Path, logical_name: &str, value: &str) -> Result<(), TriggerError> {
        let marker = repo_dir(repo_root, logical_name).join(DAEMON_EXPORT_FILE);
        if enable_flag(self.name(), logical_name, value)? {
            debug!(path = %marker.display(), "Allow export");
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&marker)
                .map(drop)
                .map_err(io_error(self.name(), &marker))
        } else {
            debug!(path = %marker.display(), "Deny export");
            remove_if_exists(&marker).map_err(io_error(self.name(), &marker))
        }
    }
}

#[derive(Debug, Default)]
struct ListingChanges {
    allow: Vec<String>,
    deny: Vec<String>,
}

/// Collects gitweb visibility and publishes it to the project list on flush
#[derive(Debug)]
pub struct GitwebTrigger {
    list: ProjectList,
    changes: RefCell<ListingChanges>,
}

impl GitwebTrigger {
    pub fn new(list: ProjectList) -> Self {
        Self {
            list,
            changes: RefCell::new(ListingChanges::default()),
        }
    }
}

impl PropertyTrigger for GitwebTrigger {
    fn name(&self) -> &'static str {
        "gitweb"
    }

    fn global_default(&self) -> Option<&'static str> {
        Some("no")
    }

    fn apply(&self, _repo_root: &Path, logical_name: &str, value: &str) -> Result<(), TriggerError> {
        let entry = format!("{logical_name}.git");
        let mut changes = self.changes.borrow_mut();
        if enable_flag(self.name(), logical_name, value)? {
            changes.allow.push(entry);
        } else {
            changes.deny.push(entry);
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), TriggerError> {
        let changes = self.changes.take();
        self.list
            .update(&changes.allow, &changes.deny)
            .map_err(io_error(self.name(), self.list.path()))
    }

    fn discard(&self) {
        self.changes.take();
    }
}

/// Writes the repository's `description` file
#[derive(Debug, Default)]
pub struct DescriptionTrigger;

impl PropertyTrigger for DescriptionTrigger {
    fn name(&self) -> &'static str {
        "description"
    }

    fn apply(&self, repo_root: &Path, logical_name: &str, value: &str) -> Result<(), TriggerError> {
        let path = repo_dir(repo_root, logical_name).join("description");
        replace_file(&path, format!("{value}\n").as_bytes()).map_err(io_error(self.name(), &path))
    }
}

/// Sets `gitweb.owner` in the repository's git config
#[derive(Debug, Default)]
pub struct OwnerTrigger;

impl PropertyTrigger for OwnerTrigger {
    fn name(&self) -> &'static str {
        "owner"
    }

    fn apply(&self, repo_root: &Path, logical_name: &str, value: &str) -> Result<(), TriggerError> {
        let path = repo_dir(repo_root, logical_name).join("config");
        let current = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(io_error(self.name(), &path)(e)),
        };
        replace_file(&path, set_gitweb_owner(&current, value).as_bytes())
            .map_err(io_error(self.name(), &path))
    }
}

fn is_section_line(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with('[') && line.contains(']')
}

fn is_owner_line(line: &str) -> bool {
    line.trim_start()
        .strip_prefix("owner")
        .map(|rest| rest.strip_prefix(char::is_whitespace).unwrap_or(rest))
        .is_some_and(|rest| rest.starts_with('='))
}

/// Set `owner` inside the `[gitweb]` section of a git config text
fn set_gitweb_owner(config: &str, owner: &str) -> String {
    let owner_line = format!("\towner = {owner}\n");
    let mut out = String::with_capacity(config.len() + owner_line.len() + 9);
    let mut lines = config.split_inclusive('\n');

    let mut in_gitweb = false;
    for line in lines.by_ref() {
        out.push_str(line);
        if line.trim() == "[gitweb]" {
            in_gitweb = true;
            break;
        }
    }
    if !in_gitweb {
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("[gitweb]\n");
    }

    let mut written = false;
    for line in lines.by_ref() {
        if is_section_line(line) {
            out.push_str(&owner_line);
            out.push_str(line);
            written = true;
            break;
        }
        if is_owner_line(line) {
            out.push_str(&owner_line);
            written = true;
            break;
        }
        out.push_str(line);
    }
    if !written {
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&owner_line);
    }

    out.extend(lines);
    out
}
