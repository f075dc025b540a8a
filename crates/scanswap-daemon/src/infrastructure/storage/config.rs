//! TOML-based configuration for the daemon.
//!
//! Reads and writes `AppConfig` at `/etc/scanswapd/config.toml`; the
//! `SCANSWAPD_CONFIG` environment variable overrides the path, which is how
//! the integration tests and ad-hoc runs point the daemon at a private file.
//!
//! A full config file looks like this:
//!
//! ```toml
//! [daemon]
//! log_level = "info"
//! control_socket = "/run/scanswapd.sock"
//!
//! [tap]
//! attach_point = "/dev/serio_raw0"
//! sink = "/run/scanswapd.out"
//!
//! [remap]
//! track_extended_sequences = true
//! disable_caps = false
//! ```
//!
//! # Serde default values
//!
//! Every section and every field carries a `serde` default, so an empty file,
//! a missing file, or a file from an older version that lacks newer fields
//! all load cleanly.  The daemon is expected to run with no config file at
//! all on a stock install.

use std::path::{Path, PathBuf};

use scanswap_core::RemapConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "SCANSWAPD_CONFIG";

/// Where the config file lives when the override is not set.
const DEFAULT_CONFIG_PATH: &str = "/etc/scanswapd/config.toml";

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
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

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level daemon configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub tap: TapConfig,
    #[serde(default)]
    pub remap: RemapConfig,
}

/// Process-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonConfig {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Path of the Unix domain socket serving the admin channel.
    #[serde(default = "default_control_socket")]
    pub control_socket: PathBuf,
}

/// Where scancode bytes come from and go to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TapConfig {
    /// The interception point, e.g. a `serio_raw` device node.
    #[serde(default = "default_attach_point")]
    pub attach_point: String,
    /// Where rewritten bytes are forwarded.
    #[serde(default = "default_sink")]
    pub sink: PathBuf,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_control_socket() -> PathBuf {
    PathBuf::from("/run/scanswapd.sock")
}
fn default_attach_point() -> String {
    "/dev/serio_raw0".to_string()
}
fn default_sink() -> PathBuf {
    PathBuf::from("/run/scanswapd.out")
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            control_socket: default_control_socket(),
        }
    }
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            attach_point: default_attach_point(),
            sink: default_sink(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the config file path, honouring the `SCANSWAPD_CONFIG` override.
pub fn config_file_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Loads `AppConfig` from the resolved path, returning `AppConfig::default()`
/// if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path())
}

/// Loads `AppConfig` from an explicit path.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let cfg: AppConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Persists `config` to the resolved path.
///
/// Creates the parent directory if it does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(&config_file_path(), config)
}

/// Persists `config` to an explicit path.
pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
