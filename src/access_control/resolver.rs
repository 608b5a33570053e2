//! Access control resolver
//!
//! Walks the identity's group closure in order and stops at the first group
//! with a rule for the requested path. Within one group the rules are tried
//! with the following precedence (highest to lowest):
//! 1. Exact listing under the mode option (`R` / `RW+`)
//! 2. Mapping directive `map <mode> <path> = <physical path>`
//! 3. Regex listing under `<mode>_regex`, anchored at the start of the path
//!
//! When two groups could both match, declaration order decides.

use crate::access_control::groups::membership_closure;
use crate::access_control::types::{DEFAULT_REPOSITORIES, Grant, MatchStrategy, Mode};
use crate::error::PolicyResult;
use crate::policy::PolicyDocument;
use tracing::{debug, trace};

/// Option naming the storage prefix, globally or per group
pub const REPOSITORIES_OPTION: &str = "repositories";

/// Access control resolver
///
/// Evaluates whether an identity may use a repository in a given mode
/// against one policy snapshot.
pub struct AccessResolver<'a> {
    policy: &'a PolicyDocument,
}

impl<'a> AccessResolver<'a> {
    pub fn new(policy: &'a PolicyDocument) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &'a PolicyDocument {
        self.policy
    }

    /// Decide whether `identity` may access `path` in `mode`.
    ///
    /// Returns `None` for no access. Callers wanting read access should check
    /// write access first: write implies read but the two are decided
    /// independently here.
    pub fn resolve(&self, identity: &str, mode: Mode, path: &str) -> PolicyResult<Option<Grant>> {
        debug!(identity, mode = %mode, path, "Checking access");

        let path = match path.strip_suffix(".git") {
            Some(stripped) => {
                trace!(path, stripped, "Stripping .git suffix");
                stripped
            }
            None => path,
        };

        for group in membership_closure(self.policy, identity)? {
            let Some((mapped, strategy)) = self.match_group(&group, mode, path)? else {
                continue;
            };

            let prefix = self.storage_prefix(&group)?;
            debug!(
                identity,
                mode = %mode,
                path,
                group = %group,
                strategy = %strategy,
                prefix = %prefix,
                mapped = %mapped,
                "Access granted"
            );
            return Ok(Some(Grant {
                prefix,
                path: mapped,
                group,
                strategy,
            }));
        }

        debug!(identity, mode = %mode, path, "No matching rule");
        Ok(None)
    }

    /// Try write access, then read access
    pub fn resolve_read(&self, identity: &str, path: &str) -> PolicyResult<Option<Grant>> {
        match self.resolve(identity, Mode::Write, path)? {
            Some(grant) => Ok(Some(grant)),
            None => self.resolve(identity, Mode::Read, path),
        }
    }

    /// Apply one group's rules to `path`
    fn match_group(
        &self,
        group: &str,
        mode: Mode,
        path: &str,
    ) -> PolicyResult<Option<(String, MatchStrategy)>> {
        if let Some(listed) = self.policy.repo_list(group, mode.as_str())?
            && listed.iter().any(|p| p == path)
        {
            trace!(group, "Matched exact listing");
            return Ok(Some((path.to_string(), MatchStrategy::Exact)));
        }

        if let Some(target) = self.policy.repo_list(group, &mode.map_option(path))?
            && let Some(mapped) = target.into_iter().next()
        {
            trace!(group, mapped = %mapped, "Matched mapping directive");
            return Ok(Some((mapped, MatchStrategy::Mapping)));
        }

        if let Some(patterns) = self.policy.repo_list(group, mode.regex_option())?
            && let Some(pattern) = self.policy.find_pattern(group, &patterns, path)?
        {
            trace!(group, pattern, "Matched regex listing");
            return Ok(Some((path.to_string(), MatchStrategy::Regex)));
        }

        Ok(None)
    }

    /// Storage prefix: the group's own, else the global one, else the default
    fn storage_prefix(&self, group: &str) -> PolicyResult<String> {
        if let Some(prefix) = self.policy.repo_scalar(group, REPOSITORIES_OPTION)? {
            return Ok(prefix);
        }
        Ok(self
            .policy
            .global_get(REPOSITORIES_OPTION)
            .unwrap_or(DEFAULT_REPOSITORIES)
            .to_string())
    }
}

/// Convenience wrapper around [`AccessResolver::resolve`]
pub fn have_access(
    policy: &PolicyDocument,
    identity: &str,
    mode: Mode,
    path: &str,
) -> PolicyResult<Option<Grant>> {
    AccessResolver::new(policy).resolve(identity, mode, path)
}
