//! CLI argument definitions for loginwatch-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::{Path, PathBuf};

use clap::Parser;

use loginwatch_core::config::LoginwatchConfig;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/loginwatch/loginwatch.toml";

/// Loginwatch SSH session monitoring daemon.
///
/// Follows the system authentication log, detects SSH logins and logouts,
/// and forwards them to the configured notification channels.
#[derive(Parser, Debug)]
#[command(name = "loginwatch-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to loginwatch.toml configuration file.
    ///
    /// If the default path does not exist, built-in defaults are used.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Override the authentication log file to follow.
    #[arg(long)]
    pub log_file: Option<String>,

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Whether `--config` still points at the built-in default path.
    pub fn uses_default_config(&self) -> bool {
        self.config == Path::new(DEFAULT_CONFIG_PATH)
    }

    /// Apply CLI overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut LoginwatchConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(log_file) = &self.log_file {
            config.detector.log_file = log_file.clone();
        }
        if let Some(pid_file) = &self.pid_file {
            config.general.pid_file = pid_file.clone();
        }
    }
}
