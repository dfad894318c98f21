//! Configuration file support.
//!
//! Settings live in an INI file at `~/.cluextract/config.ini`. Every setting
//! has a default, so a missing file or a missing key is never an error. The
//! portal password is deliberately not stored here; it is read from the
//! `CLUEXTRACT_PASSWORD` environment variable.
//!
//! ```ini
//! [service]
//! layer_url = https://.../FeatureServer/0
//! identifier_field = clu_identifier
//!
//! [partition]
//! split_margin = 800
//! strategy = equal_area
//! ```

mod file;
mod keys;

pub use file::{
    AuthSettings, ConfigFile, DownloadSettings, LoggingSettings, OutputSettings,
    PartitionSettings, ServiceSettings, DEFAULT_FALLBACK_RECORD_LIMIT, DEFAULT_LAYER_URL,
    DEFAULT_PORTAL_URL, DEFAULT_REFERER,
};
pub use keys::ConfigKey;

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Environment variable holding the portal password.
pub const PASSWORD_ENV_VAR: &str = "CLUEXTRACT_PASSWORD";

/// Name of the per-user configuration directory.
const CONFIG_DIR_NAME: &str = ".cluextract";

/// Name of the configuration file inside the configuration directory.
const CONFIG_FILE_NAME: &str = "config.ini";

/// Directory holding configuration and logs (`~/.cluextract`).
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Path of the configuration file (`~/.cluextract/config.ini`).
pub fn config_file_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

/// Default directory for log files (`~/.cluextract/logs`).
pub fn default_log_dir() -> PathBuf {
    config_dir().join("logs")
}

/// Errors reading, writing, or editing the configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The file exists but could not be read or parsed.
    ReadFailed { path: PathBuf, reason: String },

    /// The file could not be written.
    WriteFailed { path: PathBuf, source: io::Error },

    /// A value could not be interpreted.
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// The key is not a known setting.
    UnknownKey(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed { path, reason } => {
                write!(f, "failed to read {}: {}", path.display(), reason)
            }
            Self::WriteFailed { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid value '{}' for {}: {}", value, key, reason)
            }
            Self::UnknownKey(key) => write!(f, "unknown configuration key '{}'", key),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::WriteFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
