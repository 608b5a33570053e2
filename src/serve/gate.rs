//! Command gate
//!
//! Turns one untrusted SSH command into either a rewritten command that
//! names the repository by its absolute physical path, or a rejection.
//! Checks run in a fixed order and nothing touches the filesystem until the
//! command, the identity and the access decision have all been accepted.

use crate::access_control::{AccessResolver, Grant, Mode};
use crate::error::{AccessDeniedError, ServeError, ServeResult};
use crate::policy::PolicyDocument;
use crate::repository::{
    GitInitializer, PropertyTrigger, RepositoryInitializer, default_triggers, lock_repository,
    run_triggers, setup_pending,
};
use crate::serve::command::GitCommand;
use crate::serve::identity::decode_identity;
use crate::util::resolve_path;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Global option enabling encoded identities
pub const DECODE_ID_OPTION: &str = "decodeID";

/// An authorized command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeOutcome {
    /// Rewritten command for `git shell -c`
    pub command: String,
    pub verb: String,
    /// Absolute path of the bare repository
    pub path: PathBuf,
    /// Whether this call created the repository
    pub created: bool,
    pub grant: Grant,
}

/// Validates and rewrites SSH commands against one policy snapshot
pub struct CommandGate<'a> {
    policy: &'a PolicyDocument,
    home: PathBuf,
    initializer: Box<dyn RepositoryInitializer + 'a>,
    triggers: Vec<Box<dyn PropertyTrigger>>,
}

impl<'a> CommandGate<'a> {
    /// Gate with `git init --bare` and the built-in property triggers.
    ///
    /// Relative storage prefixes resolve under `home`.
    pub fn new(policy: &'a PolicyDocument, home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let triggers = default_triggers(policy, &home);
        Self {
            policy,
            home,
            initializer: Box::new(GitInitializer::default()),
            triggers,
        }
    }

    pub fn with_initializer(mut self, initializer: impl RepositoryInitializer + 'a) -> Self {
        self.initializer = Box::new(initializer);
        self
    }

    pub fn with_git_program(self, program: impl Into<String>) -> Self {
        self.with_initializer(GitInitializer::new(program))
    }

    pub fn with_triggers(mut self, triggers: Vec<Box<dyn PropertyTrigger>>) -> Self {
        self.triggers = triggers;
        self
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Authorize `command` for `identity` and rewrite it.
    ///
    /// A repository the identity may use but which does not exist yet is
    /// created, and the property triggers run for it. Until they succeed
    /// once, every later call retries them.
    #[instrument(skip(self))]
    pub fn serve(&self, identity: &str, command: &str) -> ServeResult<ServeOutcome> {
        let parsed = GitCommand::parse(command)?;
        debug!(verb = parsed.verb(), path = parsed.path(), "Command accepted");

        let identity = self.effective_identity(identity)?;

        let resolver = AccessResolver::new(self.policy);
        let grant = if parsed.is_write() {
            resolver
                .resolve(&identity, Mode::Write, parsed.path())?
                .ok_or_else(|| AccessDeniedError::write(parsed.path()))?
        } else {
            resolver
                .resolve_read(&identity, parsed.path())?
                .ok_or_else(|| AccessDeniedError::read(parsed.path()))?
        };

        check_repository_path(&grant.path)?;

        let root = resolve_path(&self.home, &grant.prefix);
        let full_path = root.join(format!("{}.git", grant.path));

        let created = if full_path.exists() && !setup_pending(&full_path) {
            false
        } else {
            self.provision(&root, &full_path, &grant.path)?
        };

        let command = format!("{} '{}'", parsed.verb(), full_path.display());
        debug!(command = %command, "Serving");

        Ok(ServeOutcome {
            command,
            verb: parsed.verb().to_string(),
            path: full_path,
            created,
            grant,
        })
    }

    fn effective_identity(&self, identity: &str) -> ServeResult<String> {
        if self.policy.global_bool(DECODE_ID_OPTION)? != Some(true) {
            return Ok(identity.to_string());
        }
        let decoded = decode_identity(identity)?;
        debug!(encoded = identity, decoded = %decoded, "Decoded identity");
        Ok(decoded)
    }

    fn provision(&self, root: &Path, full_path: &Path, logical_name: &str) -> ServeResult<bool> {
        let create_error = |source: io::Error| ServeError::Create {
            path: full_path.to_path_buf(),
            source,
        };

        let guard = lock_repository(full_path).map_err(create_error)?;
        let created = guard
            .create(self.initializer.as_ref())
            .map_err(create_error)?;

        if created {
            info!(path = %full_path.display(), "Created repository on first access");
        }
        if guard.setup_pending() {
            if !created {
                info!(path = %full_path.display(), "Resuming unfinished repository setup");
            }
            run_triggers(self.policy, &self.triggers, root, logical_name)?;
            guard.finish_setup().map_err(create_error)?;
        }
        Ok(created)
    }
}

/// Reject physical paths that could escape the storage root or nest one
/// repository inside another
fn check_repository_path(path: &str) -> Result<(), AccessDeniedError> {
    let segments: Vec<&str> = path.split('/').collect();
    let Some((last, intermediate)) = segments.split_last() else {
        return Err(AccessDeniedError::bad_repository_path(path));
    };

    let escapes = segments
        .iter()
        .any(|s| s.is_empty() || *s == "." || *s == "..");
    let nested = intermediate.iter().any(|s| s.ends_with(".git"));

    if escapes || nested || last.ends_with(".git") {
        return Err(AccessDeniedError::bad_repository_path(path));
    }
    Ok(())
}
