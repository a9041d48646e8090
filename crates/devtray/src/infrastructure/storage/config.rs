//! TOML configuration for the tray widget.
//!
//! Read from `$XDG_CONFIG_HOME/devtray/config.toml` (or
//! `~/.config/devtray/config.toml`), or from the path given with `--config`.
//!
//! # Example (for beginners)
//!
//! ```toml
//! [tray]
//! controller_domain = "dom0"
//! log_level = "debug"
//! announce_devices = false
//!
//! [alerts]
//! command = "notify-send"
//! error_timeout_ms = 15000
//!
//! [platform]
//! device_command = "qvm-device"
//! list_command = "qvm-ls"
//! ```
//!
//! Every field carries a `#[serde(default = "...")]`, so a missing file, a
//! missing section and a missing key all fall back to the same defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither `XDG_CONFIG_HOME` nor `HOME` is set.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TrayConfig {
    #[serde(default)]
    pub tray: GeneralConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
}

/// General widget behaviour.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// Name of the privileged domain that never receives devices.
    #[serde(default = "default_controller_domain")]
    pub controller_domain: String,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Alert when a device appears or disappears.
    #[serde(default = "default_true")]
    pub announce_devices: bool,
}

/// Desktop notification settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AlertConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Program invoked as `<command> [options] <text>`.
    #[serde(default = "default_alert_command")]
    pub command: String,
    /// How long error alerts stay on screen.
    #[serde(default = "default_error_timeout_ms")]
    pub error_timeout_ms: u32,
    #[serde(default = "default_error_icon")]
    pub error_icon: String,
}

/// Names of the platform's command-line tools.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PlatformConfig {
    #[serde(default = "default_device_command")]
    pub device_command: String,
    #[serde(default = "default_list_command")]
    pub list_command: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_controller_domain() -> String {
    devtray_core::DEFAULT_CONTROLLER_DOMAIN.to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_alert_command() -> String {
    "notify-send".to_string()
}
fn default_error_timeout_ms() -> u32 {
    15_000
}
fn default_error_icon() -> String {
    "dialog-error".to_string()
}
fn default_device_command() -> String {
    "qvm-device".to_string()
}
fn default_list_command() -> String {
    "qvm-ls".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            controller_domain: default_controller_domain(),
            log_level: default_log_level(),
            announce_devices: default_true(),
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            command: default_alert_command(),
            error_timeout_ms: default_error_timeout_ms(),
            error_icon: default_error_icon(),
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            device_command: default_device_command(),
            list_command: default_list_command(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Directory holding `config.toml`.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when neither
/// `XDG_CONFIG_HOME` nor `HOME` is set.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
        .ok_or(ConfigError::NoPlatformConfigDir)?;
    Ok(base.join("devtray"))
}

/// Full path of the default config file.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads the config from the default location.
pub fn load_config() -> Result<TrayConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads the config from `path`, returning defaults if the file does not
/// exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<TrayConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TrayConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
