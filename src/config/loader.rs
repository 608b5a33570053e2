//! Configuration loader with layered sources
//!
//! Loads settings from multiple sources with the following precedence
//! (highest to lowest):
//! 1. Environment variables (GITWARD__*)
//! 2. Configuration file (TOML)
//! 3. Default values

use crate::config::types::AppConfig;
use crate::error::ConfigError;
use config::{Config, Environment, File, FileFormat};
use std::path::Path;

/// Default configuration file paths to check (in order)
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "gitward.toml",
    "~/.config/gitward/config.toml",
    "/etc/gitward/config.toml",
];

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Load configuration from a TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(toml_str, FileFormat::Toml))
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;
    Ok(app_config)
}

/// Load configuration from files and environment
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        // Explicit path provided - must exist
        if !Path::new(path).exists() {
            return Err(ConfigError::Load(format!(
                "Configuration file not found: {path}"
            )));
        }
        builder = builder.add_source(File::new(path, FileFormat::Toml));
    } else {
        // First existing default wins
        for path in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                builder = builder.add_source(File::new(&expanded, FileFormat::Toml));
                break;
            }
        }
    }

    // e.g. GITWARD__POLICY__PATH, GITWARD__SERVER__HOME
    builder = builder.add_source(
        Environment::with_prefix("GITWARD")
            .prefix_separator("__")
            .separator("__"),
    );

    let config = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;
    Ok(app_config)
}

/// Validate configuration values
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.policy.path.trim().is_empty() {
        return Err(ConfigError::Missing {
            field: "policy.path".to_string(),
        });
    }

    if config.server.git_program.trim().is_empty() {
        return Err(ConfigError::Missing {
            field: "server.git_program".to_string(),
        });
    }

    if let Some(level) = &config.logging.level
        && !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str())
    {
        return Err(ConfigError::Invalid {
            message: format!(
                "logging.level must be one of {}, got: {level}",
                LOG_LEVELS.join(", ")
            ),
        });
    }

    Ok(())
}
