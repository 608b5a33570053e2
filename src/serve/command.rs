//! Parsing of the untrusted SSH command
//!
//! Only the git pack services are accepted, with exactly one single-quoted
//! repository path made of `[a-zA-Z0-9@._-]` segments that each start with
//! an alphanumeric character.

use crate::error::ProtocolError;
use std::fmt;

/// Verbs that only read from the repository
pub const COMMANDS_READONLY: &[&str] = &["git-upload-pack", "git upload-pack"];

/// Verbs that write to the repository
pub const COMMANDS_WRITE: &[&str] = &["git-receive-pack", "git receive-pack"];

/// A validated git service request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCommand {
    verb: String,
    path: String,
}

impl GitCommand {
    /// Parse and validate a command line.
    pub fn parse(command: &str) -> Result<Self, ProtocolError> {
        if command.contains('\n') {
            return Err(ProtocolError::CommandContainsNewline);
        }

        let (mut verb, mut args) =
            split_first_word(command).ok_or(ProtocolError::UnknownCommand)?;

        let compound;
        if verb == "git" {
            let (subverb, rest) = split_first_word(args).ok_or(ProtocolError::UnknownCommand)?;
            compound = format!("git {subverb}");
            verb = compound.as_str();
            args = rest;
        }

        if !COMMANDS_WRITE.contains(&verb) && !COMMANDS_READONLY.contains(&verb) {
            return Err(ProtocolError::UnknownCommand);
        }

        let path = quoted_repository_path(args).ok_or(ProtocolError::UnsafeArguments)?;

        Ok(Self {
            verb: verb.to_string(),
            path: path.to_string(),
        })
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// Requested path, leading slashes removed
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_write(&self) -> bool {
        COMMANDS_WRITE.contains(&self.verb.as_str())
    }
}

impl fmt::Display for GitCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.verb, self.path)
    }
}

/// Split off the first word; the remainder must be non-empty
fn split_first_word(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    let (word, rest) = s.split_once(char::is_whitespace)?;
    let rest = rest.trim_start();
    (!rest.is_empty()).then_some((word, rest))
}

fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphanumeric())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | '-'))
}

/// Extract the path from `'/*seg(/seg)*'`
fn quoted_repository_path(args: &str) -> Option<&str> {
    let inner = args.strip_prefix('\'')?.strip_suffix('\'')?;
    let path = inner.trim_start_matches('/');
    path.split('/').all(is_valid_segment).then_some(path)
}
