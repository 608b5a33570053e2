//! Configuration types for gitward
//!
//! Ambient settings loaded from TOML files and/or environment variables. The
//! access policy itself is a separate document, see [`crate::policy`].

use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where the policy document lives
    pub policy: PolicyConfig,

    /// Serving settings
    pub server: ServerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Home directory that relative storage prefixes resolve under
    pub fn home_dir(&self) -> Option<PathBuf> {
        match &self.server.home {
            Some(home) => Some(PathBuf::from(shellexpand::tilde(home).as_ref())),
            None => dirs::home_dir(),
        }
    }

    /// Policy document path, tilde-expanded
    pub fn policy_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.policy.path).as_ref())
    }
}

/// Policy document location
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Path to the gitosis-style policy file
    pub path: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            path: "~/.gitosis.conf".to_string(),
        }
    }
}

/// Serving configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Home directory override (default: the user's home)
    pub home: Option<String>,

    /// Program used to initialize bare repositories and run `git shell`
    pub git_program: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            home: None,
            git_program: "git".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); the policy's `loglevel`
    /// takes precedence when set
    pub level: Option<String>,

    /// Output format (pretty, json)
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format
    #[default]
    Pretty,
    /// JSON format for log aggregation
    Json,
}
