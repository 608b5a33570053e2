//! Error types for gitward
//!
//! This module defines the error hierarchy used throughout the application.
//! Every rejection is terminal: nothing here is retried, and the front end
//! turns each error into a single logged line and a non-zero exit status.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("{0}")]
    Serve(#[from] ServeError),
}

/// Ambient settings errors (the TOML/env settings, not the policy document)
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {field}")]
    Missing { field: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Structural errors in the policy document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("[Syntax Error][{line}] {message}")]
    Syntax { line: usize, message: String },

    #[error("{message}")]
    Tokenize { message: String },

    #[error("Bad regex '{pattern}' in section '{section}': {reason}")]
    InvalidPattern {
        section: String,
        pattern: String,
        reason: String,
    },

    #[error("Group name must start with '@' and may not be '@all', got {0:?}")]
    InvalidGroupName(String),

    #[error("Invalid {what} {text:?} in section '{section}'")]
    InvalidText {
        section: String,
        what: &'static str,
        text: String,
    },

    #[error("Mapping '{key}' in section '{section}' must name exactly one target")]
    InvalidMapping { section: String, key: String },

    #[error("Option '{option}' in section '{section}' is not a boolean: '{value}'")]
    InvalidBoolean {
        section: String,
        option: String,
        value: String,
    },
}

impl PolicyError {
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }

    /// Report an error raised while loading as a syntax error on `line`
    pub fn at_line(self, line: usize) -> Self {
        match self {
            Self::Syntax { .. } => self,
            Self::Tokenize { message } => Self::Syntax { line, message },
            other => Self::Syntax {
                line,
                message: other.to_string(),
            },
        }
    }
}

/// Untrusted-input errors raised before any decision is made
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Command may not contain newline")]
    CommandContainsNewline,

    #[error("Unknown command denied")]
    UnknownCommand,

    #[error("Arguments to command look dangerous")]
    UnsafeArguments,

    #[error("Bad encoded user id")]
    BadEncodedId,
}

/// Authorization errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} for '{path}'")]
pub struct AccessDeniedError {
    pub kind: DenialKind,
    pub path: String,
}

/// Why an otherwise well-formed request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialKind {
    Write,
    Read,
    BadRepositoryPath,
}

impl std::fmt::Display for DenialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DenialKind::Write => "Repository write access denied",
            DenialKind::Read => "Repository read access denied",
            DenialKind::BadRepositoryPath => {
                "Intermediate repository path contains component ends with '.git'"
            }
        })
    }
}

impl AccessDeniedError {
    pub fn write(path: impl Into<String>) -> Self {
        Self {
            kind: DenialKind::Write,
            path: path.into(),
        }
    }

    pub fn read(path: impl Into<String>) -> Self {
        Self {
            kind: DenialKind::Read,
            path: path.into(),
        }
    }

    pub fn bad_repository_path(path: impl Into<String>) -> Self {
        Self {
            kind: DenialKind::BadRepositoryPath,
            path: path.into(),
        }
    }
}

/// Errors from property triggers and the published project listing
#[derive(Error, Debug)]
pub enum TriggerError {
    #[error("Trigger '{trigger}' failed for '{path}': {source}")]
    Io {
        trigger: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// Errors raised while serving one command
#[derive(Error, Debug)]
pub enum ServeError {
    #[error("{0}")]
    Protocol(#[from] ProtocolError),

    #[error("{0}")]
    Access(#[from] AccessDeniedError),

    #[error("{0}")]
    Policy(#[from] PolicyError),

    #[error("Failed to create '{path}': {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Trigger(#[from] TriggerError),
}

impl ServeError {
    /// Access denials are an expected outcome, not a fault
    pub fn is_access_denial(&self) -> bool {
        matches!(self, ServeError::Access(_))
    }

    pub fn is_protocol_error(&self) -> bool {
        matches!(self, ServeError::Protocol(_))
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for policy operations
pub type PolicyResult<T> = std::result::Result<T, PolicyError>;

/// Result type alias for serving a command
pub type ServeResult<T> = std::result::Result<T, ServeError>;
