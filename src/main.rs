//! gitward
//!
//! Restricts SSH sessions to git pack operations allowed by a gitosis-style
//! access policy.

use anyhow::Context;
use clap::{Parser, Subcommand};
use gitward::{
    config::{AppConfig, LogFormat, load_config},
    error::ServeError,
    policy::{PolicyDocument, load_policy},
    serve::{CommandGate, encode_identity},
};
use std::os::unix::process::CommandExt;
use std::process::{self, Command};
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable sshd sets to the client's requested command
const SSH_ORIGINAL_COMMAND: &str = "SSH_ORIGINAL_COMMAND";

/// gitward - policy-driven gate for SSH git access
#[derive(Parser, Debug)]
#[command(name = "gitward")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "GITWARD_CONFIG", global = true)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "GITWARD_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Serve the command in SSH_ORIGINAL_COMMAND for USER
    Serve {
        /// Identity the SSH key was issued to
        user: String,
    },

    /// Print the encoded form of an identity for authorized_keys
    EncodeId {
        /// Raw identity
        identity: String,
    },
}

/// Map a policy `loglevel` value onto a tracing level
fn policy_log_level(value: &str) -> Option<&'static str> {
    match value.trim().to_ascii_uppercase().as_str() {
        "TRACE" => Some("trace"),
        "DEBUG" => Some("debug"),
        "INFO" => Some("info"),
        "WARN" | "WARNING" => Some("warn"),
        "ERROR" | "CRITICAL" | "FATAL" => Some("error"),
        _ => None,
    }
}

/// Initialize logging: RUST_LOG, then the CLI flag, then the policy, then
/// the settings file
fn init_logging(args: &Args, policy: Option<&PolicyDocument>, config: &AppConfig) {
    let level = args
        .log_level
        .clone()
        .or_else(|| {
            policy
                .and_then(|p| p.global_get("loglevel"))
                .and_then(policy_log_level)
                .map(str::to_string)
        })
        .or_else(|| config.logging.level.clone())
        .unwrap_or_else(|| "info".to_string());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let registry = tracing_subscriber::registry().with(filter);
    match config.logging.format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

/// Log the one rejection line and exit
fn reject(err: &ServeError) -> ! {
    let kind = if err.is_access_denial() {
        "denied"
    } else if err.is_protocol_error() {
        "protocol"
    } else {
        "fault"
    };
    error!(kind, "{err}");
    process::exit(1);
}

fn serve(args: &Args, user: &str) -> anyhow::Result<()> {
    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            init_logging(args, None, &AppConfig::default());
            error!(error = %e, "Failed to load configuration");
            process::exit(1);
        }
    };

    let policy = match load_policy(&config.policy_path()) {
        Ok(policy) => policy,
        Err(e) => {
            init_logging(args, None, &config);
            error!(error = %e, "Failed to load policy");
            process::exit(1);
        }
    };

    init_logging(args, Some(&policy), &config);

    let Ok(command) = std::env::var(SSH_ORIGINAL_COMMAND) else {
        error!("Need {SSH_ORIGINAL_COMMAND} in environment.");
        process::exit(1);
    };
    debug!(command = %command, "Got command");

    let home = config
        .home_dir()
        .context("Cannot determine home directory")?;
    let previous = gitward::util::apply_session_umask();
    debug!(previous = %format!("{previous:o}"), "Set umask");
    std::env::set_current_dir(&home)
        .with_context(|| format!("Cannot change directory to {}", home.display()))?;

    let gate =
        CommandGate::new(&policy, &home).with_git_program(config.server.git_program.clone());
    let outcome = match gate.serve(user, &command) {
        Ok(outcome) => outcome,
        Err(e) => reject(&e),
    };

    info!(user, command = %outcome.command, created = outcome.created, "Serving");

    let err = Command::new(&config.server.git_program)
        .args(["shell", "-c", &outcome.command])
        .exec();
    error!(error = %err, "Cannot execute git-shell.");
    process::exit(1);
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match &args.command {
        Cmd::Serve { user } => serve(&args, user),
        Cmd::EncodeId { identity } => {
            println!("{}", encode_identity(identity));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_log_level() {
        assert_eq!(policy_log_level("INFO"), Some("info"));
        assert_eq!(policy_log_level("WARNING"), Some("warn"));
        assert_eq!(policy_log_level("critical"), Some("error"));
        assert_eq!(policy_log_level("chatty"), None);
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from(["gitward", "serve", "alice", "--log-level", "debug"])
            .unwrap();
        assert!(matches!(args.command, Cmd::Serve { ref user } if user == "alice"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
    }
}
