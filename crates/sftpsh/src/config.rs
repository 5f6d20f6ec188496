//! Configuration for the interactive shell

use crate::auth::DEFAULT_PROMPT_ATTEMPTS;
use crate::help::DEFAULT_HELP_DIR;
use crate::known_hosts::DEFAULT_PORT;
use crate::{Error, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Shell configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Remote host
    #[serde(default)]
    pub host: String,

    /// SSH port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Remote user name
    #[serde(default = "default_username")]
    pub username: String,

    /// Private key offered when no password is given
    #[serde(default = "default_identity")]
    pub identity: PathBuf,

    /// Trust-on-first-use host key store (NIST 800-53: IA-3)
    #[serde(default = "default_known_hosts")]
    pub known_hosts: PathBuf,

    /// Default destination of `get`
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Directory holding the help files
    #[serde(default = "default_help_dir")]
    pub help_dir: PathBuf,

    /// Mirror the command history to this file, truncated at startup
    #[serde(default)]
    pub history_file: Option<PathBuf>,

    /// Interactive attempts per recovery stage (NIST 800-53: AC-7)
    #[serde(default = "default_max_prompt_attempts")]
    pub max_prompt_attempts: u32,

    /// Connection inactivity timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
///
/// NIST 800-53: AU-2 (Audit Events), AU-12 (Audit Generation)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log filter (trace, debug, info, warn, error, or an `EnvFilter` directive)
    pub level: String,
    /// Log format (text or json)
    pub format: LogFormat,
    /// Optional log file path (logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn,russh=warn".to_string(),
            format: LogFormat::Text,
            file: None,
        }
    }
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Plain text logging for human readability
    Text,
    /// JSON structured logging
    Json,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            username: default_username(),
            identity: default_identity(),
            known_hosts: default_known_hosts(),
            download_dir: default_download_dir(),
            help_dir: default_help_dir(),
            history_file: None,
            max_prompt_attempts: default_max_prompt_attempts(),
            timeout: default_timeout(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

        let config: Self =
            toml::from_str(&content).map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;
        Ok(config.expanded())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("host must be set".to_string()));
        }

        if self.username.trim().is_empty() {
            return Err(Error::Config("username must be set".to_string()));
        }

        if self.port == 0 {
            return Err(Error::Config("port must be non-zero".to_string()));
        }

        if self.max_prompt_attempts == 0 {
            return Err(Error::Config(
                "max_prompt_attempts must be at least 1".to_string(),
            ));
        }

        if self.download_dir.exists() && !self.download_dir.is_dir() {
            return Err(Error::Config(format!(
                "Download path is not a directory: {:?}",
                self.download_dir
            )));
        }

        Ok(())
    }

    /// Inactivity timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Copy with a leading `~` in every path replaced by the home directory
    pub fn expanded(mut self) -> Self {
        self.identity = expand_tilde(&self.identity);
        self.known_hosts = expand_tilde(&self.known_hosts);
        self.download_dir = expand_tilde(&self.download_dir);
        self.help_dir = expand_tilde(&self.help_dir);
        self.history_file = self.history_file.as_deref().map(expand_tilde);
        self.logging.file = self.logging.file.as_deref().map(expand_tilde);
        self
    }
}

/// Replace a leading `~` with the home directory, if one is known
pub fn expand_tilde(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_username() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default()
}

fn default_identity() -> PathBuf {
    expand_tilde(Path::new("~/.ssh/id_rsa"))
}

fn default_known_hosts() -> PathBuf {
    expand_tilde(Path::new("~/.ssh/known_hosts"))
}

fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_help_dir() -> PathBuf {
    PathBuf::from(DEFAULT_HELP_DIR)
}

// NIST 800-53: AC-7 (Unsuccessful Logon Attempts)
fn default_max_prompt_attempts() -> u32 {
    DEFAULT_PROMPT_ATTEMPTS
}

fn default_timeout() -> u64 {
    300 // 5 minutes
}
