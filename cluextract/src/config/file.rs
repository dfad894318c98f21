//! The INI configuration file.

use std::path::{Path, PathBuf};

use ini::Ini;

use crate::fetch::{DateFormat, DEFAULT_IDENTIFIER_FIELD};
use crate::geometry::SubdivisionStrategy;
use crate::output::OutputFormat;
use crate::partition::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_RECYCLES, DEFAULT_SPLIT_MARGIN};
use crate::service::{DEFAULT_RETRY_DELAY_SECS, DEFAULT_TIMEOUT_SECS};

use super::keys::ConfigKey;
use super::{config_file_path, default_log_dir, ConfigError};

/// USDA Common Land Unit feature layer.
pub const DEFAULT_LAYER_URL: &str = "https://gis.sc.egov.usda.gov/appserver/rest/services/common_land_units/common_land_units/FeatureServer/0";

/// NRCS portal used to generate tokens.
pub const DEFAULT_PORTAL_URL: &str = "https://gis.sc.egov.usda.gov/portal/";

/// Referer tokens are bound to.
pub const DEFAULT_REFERER: &str = "https://gis.sc.egov.usda.gov";

/// Record limit used when the layer does not report `maxRecordCount`.
pub const DEFAULT_FALLBACK_RECORD_LIMIT: u64 = 1000;

/// `[service]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    pub layer_url: String,
    pub portal_url: String,
    pub identifier_field: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            layer_url: DEFAULT_LAYER_URL.to_string(),
            portal_url: DEFAULT_PORTAL_URL.to_string(),
            identifier_field: DEFAULT_IDENTIFIER_FIELD.to_string(),
        }
    }
}

/// `[auth]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSettings {
    /// Fixed token; takes precedence over username.
    pub token: Option<String>,
    /// Portal user for token generation.
    pub username: Option<String>,
    pub referer: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            token: None,
            username: None,
            referer: DEFAULT_REFERER.to_string(),
        }
    }
}

/// `[partition]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionSettings {
    pub split_margin: u64,
    pub fallback_record_limit: u64,
    pub strategy: SubdivisionStrategy,
    pub max_depth: u32,
    pub max_recycles: u32,
}

impl Default for PartitionSettings {
    fn default() -> Self {
        Self {
            split_margin: DEFAULT_SPLIT_MARGIN,
            fallback_record_limit: DEFAULT_FALLBACK_RECORD_LIMIT,
            strategy: SubdivisionStrategy::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            max_recycles: DEFAULT_MAX_RECYCLES,
        }
    }
}

/// `[download]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadSettings {
    /// HTTP timeout in seconds.
    pub timeout: u64,
    /// Pause before retrying a failed query, in seconds.
    pub retry_delay: u64,
    /// Requests fetched concurrently.
    pub parallel: usize,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT_SECS,
            retry_delay: DEFAULT_RETRY_DELAY_SECS,
            parallel: 1,
        }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSettings {
    pub directory: PathBuf,
    pub format: OutputFormat,
    pub date_format: DateFormat,
    /// Drop features that do not intersect the AOI.
    pub select_intersecting: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            format: OutputFormat::default(),
            date_format: DateFormat::default(),
            select_intersecting: true,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: default_log_dir(),
        }
    }
}

/// All settings from the configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub service: ServiceSettings,
    pub auth: AuthSettings,
    pub partition: PartitionSettings,
    pub download: DownloadSettings,
    pub output: OutputSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Loads `~/.cluextract/config.ini`, or defaults if it does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Loads a configuration file, or defaults if it does not exist.
    ///
    /// Keys missing from the file keep their defaults; unknown keys are
    /// ignored.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut config = Self::default();
        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|section| section.get(key.key_name()));
            if let Some(value) = value {
                key.set(&mut config, value)?;
            }
        }

        Ok(config)
    }

    /// Saves to `~/.cluextract/config.ini`.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Saves to `path`, creating its directory if needed.
    ///
    /// Unset optional values are left out of the file.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }

        ini.write_to_file(path).map_err(|e| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }
}
