//! CLI argument definitions for the Frontdesk server.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Frontdesk - conversation routing and retrieval engine for AI receptionists.
#[derive(Parser, Debug)]
#[command(name = "frontdesk", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Data directory for the SQLite database and API token.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Write the effective configuration to the config path and exit.
    #[arg(long = "init-config")]
    pub init_config: bool,
}

impl CliArgs {
    /// Priority: --config > FRONTDESK_CONFIG > ~/.frontdesk/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("FRONTDESK_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Priority: --port > FRONTDESK_PORT > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        std::env::var("FRONTDESK_PORT")
            .ok()
            .and_then(|val| val.parse::<u16>().ok())
            .unwrap_or(config_port)
    }

    /// `None` when not overridden.
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

fn default_config_path() -> PathBuf {
    match home_dir() {
        Some(home) => home.join(".frontdesk").join("config.toml"),
        None => PathBuf::from("config.toml"),
    }
}

pub(crate) fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    let home = std::env::var("USERPROFILE");
    #[cfg(not(target_os = "windows"))]
    let home = std::env::var("HOME");
    home.ok().map(PathBuf::from)
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")), home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
