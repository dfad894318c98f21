//! Typed access to individual configuration settings by `section.key` name.

use std::path::PathBuf;
use std::str::FromStr;

use crate::fetch::DateFormat;

use super::file::ConfigFile;
use super::ConfigError;

/// A single configuration setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    ServiceLayerUrl,
    ServicePortalUrl,
    ServiceIdentifierField,
    AuthToken,
    AuthUsername,
    AuthReferer,
    PartitionSplitMargin,
    PartitionFallbackRecordLimit,
    PartitionStrategy,
    PartitionMaxDepth,
    PartitionMaxRecycles,
    DownloadTimeout,
    DownloadRetryDelay,
    DownloadParallel,
    OutputDirectory,
    OutputFormat,
    OutputDateFormat,
    OutputSelectIntersecting,
    LoggingDirectory,
}

const ALL_KEYS: [ConfigKey; 19] = [
    ConfigKey::ServiceLayerUrl,
    ConfigKey::ServicePortalUrl,
    ConfigKey::ServiceIdentifierField,
    ConfigKey::AuthToken,
    ConfigKey::AuthUsername,
    ConfigKey::AuthReferer,
    ConfigKey::PartitionSplitMargin,
    ConfigKey::PartitionFallbackRecordLimit,
    ConfigKey::PartitionStrategy,
    ConfigKey::PartitionMaxDepth,
    ConfigKey::PartitionMaxRecycles,
    ConfigKey::DownloadTimeout,
    ConfigKey::DownloadRetryDelay,
    ConfigKey::DownloadParallel,
    ConfigKey::OutputDirectory,
    ConfigKey::OutputFormat,
    ConfigKey::OutputDateFormat,
    ConfigKey::OutputSelectIntersecting,
    ConfigKey::LoggingDirectory,
];

impl ConfigKey {
    /// Every key, grouped by section in file order.
    pub fn all() -> &'static [ConfigKey] {
        &ALL_KEYS
    }

    /// INI section of the key.
    pub fn section(&self) -> &'static str {
        match self {
            Self::ServiceLayerUrl | Self::ServicePortalUrl | Self::ServiceIdentifierField => {
                "service"
            }
            Self::AuthToken | Self::AuthUsername | Self::AuthReferer => "auth",
            Self::PartitionSplitMargin
            | Self::PartitionFallbackRecordLimit
            | Self::PartitionStrategy
            | Self::PartitionMaxDepth
            | Self::PartitionMaxRecycles => "partition",
            Self::DownloadTimeout | Self::DownloadRetryDelay | Self::DownloadParallel => {
                "download"
            }
            Self::OutputDirectory
            | Self::OutputFormat
            | Self::OutputDateFormat
            | Self::OutputSelectIntersecting => "output",
            Self::LoggingDirectory => "logging",
        }
    }

    /// Key name within its section.
    pub fn key_name(&self) -> &'static str {
        match self {
            Self::ServiceLayerUrl => "layer_url",
            Self::ServicePortalUrl => "portal_url",
            Self::ServiceIdentifierField => "identifier_field",
            Self::AuthToken => "token",
            Self::AuthUsername => "username",
            Self::AuthReferer => "referer",
            Self::PartitionSplitMargin => "split_margin",
            Self::PartitionFallbackRecordLimit => "fallback_record_limit",
            Self::PartitionStrategy => "strategy",
            Self::PartitionMaxDepth => "max_depth",
            Self::PartitionMaxRecycles => "max_recycles",
            Self::DownloadTimeout => "timeout",
            Self::DownloadRetryDelay => "retry_delay",
            Self::DownloadParallel => "parallel",
            Self::OutputDirectory => "directory",
            Self::OutputFormat => "format",
            Self::OutputDateFormat => "date_format",
            Self::OutputSelectIntersecting => "select_intersecting",
            Self::LoggingDirectory => "directory",
        }
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as text; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            Self::ServiceLayerUrl => config.service.layer_url.clone(),
            Self::ServicePortalUrl => config.service.portal_url.clone(),
            Self::ServiceIdentifierField => config.service.identifier_field.clone(),
            Self::AuthToken => config.auth.token.clone().unwrap_or_default(),
            Self::AuthUsername => config.auth.username.clone().unwrap_or_default(),
            Self::AuthReferer => config.auth.referer.clone(),
            Self::PartitionSplitMargin => config.partition.split_margin.to_string(),
            Self::PartitionFallbackRecordLimit => {
                config.partition.fallback_record_limit.to_string()
            }
            Self::PartitionStrategy => config.partition.strategy.to_string(),
            Self::PartitionMaxDepth => config.partition.max_depth.to_string(),
            Self::PartitionMaxRecycles => config.partition.max_recycles.to_string(),
            Self::DownloadTimeout => config.download.timeout.to_string(),
            Self::DownloadRetryDelay => config.download.retry_delay.to_string(),
            Self::DownloadParallel => config.download.parallel.to_string(),
            Self::OutputDirectory => config.output.directory.display().to_string(),
            Self::OutputFormat => config.output.format.to_string(),
            Self::OutputDateFormat => config.output.date_format.to_string(),
            Self::OutputSelectIntersecting => config.output.select_intersecting.to_string(),
            Self::LoggingDirectory => config.logging.directory.display().to_string(),
        }
    }

    /// Parses and stores `value`.
    ///
    /// An empty value clears optional settings.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        let invalid = |reason: String| ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason,
        };

        match self {
            Self::ServiceLayerUrl => config.service.layer_url = non_empty(value, invalid)?,
            Self::ServicePortalUrl => config.service.portal_url = non_empty(value, invalid)?,
            Self::ServiceIdentifierField => {
                config.service.identifier_field = non_empty(value, invalid)?
            }
            Self::AuthToken => config.auth.token = optional(value),
            Self::AuthUsername => config.auth.username = optional(value),
            Self::AuthReferer => config.auth.referer = non_empty(value, invalid)?,
            Self::PartitionSplitMargin => {
                config.partition.split_margin = positive(value, invalid)?
            }
            Self::PartitionFallbackRecordLimit => {
                config.partition.fallback_record_limit = positive(value, invalid)?
            }
            Self::PartitionStrategy => config.partition.strategy = value.parse().map_err(invalid)?,
            Self::PartitionMaxDepth => config.partition.max_depth = number(value, invalid)?,
            Self::PartitionMaxRecycles => config.partition.max_recycles = number(value, invalid)?,
            Self::DownloadTimeout => config.download.timeout = positive(value, invalid)?,
            Self::DownloadRetryDelay => config.download.retry_delay = number(value, invalid)?,
            Self::DownloadParallel => config.download.parallel = positive(value, invalid)?,
            Self::OutputDirectory => {
                config.output.directory = PathBuf::from(non_empty(value, invalid)?)
            }
            Self::OutputFormat => config.output.format = value.parse().map_err(invalid)?,
            Self::OutputDateFormat => {
                config.output.date_format = DateFormat::new(value).map_err(invalid)?
            }
            Self::OutputSelectIntersecting => {
                config.output.select_intersecting = boolean(value, invalid)?
            }
            Self::LoggingDirectory => {
                config.logging.directory = PathBuf::from(non_empty(value, invalid)?)
            }
        }

        Ok(())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ALL_KEYS
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

fn optional(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn non_empty<F>(value: &str, invalid: F) -> Result<String, ConfigError>
where
    F: FnOnce(String) -> ConfigError,
{
    if value.is_empty() {
        Err(invalid("value cannot be empty".to_string()))
    } else {
        Ok(value.to_string())
    }
}

fn number<T, F>(value: &str, invalid: F) -> Result<T, ConfigError>
where
    T: FromStr,
    F: FnOnce(String) -> ConfigError,
{
    value
        .parse()
        .map_err(|_| invalid("expected a whole number".to_string()))
}

fn positive<T, F>(value: &str, invalid: F) -> Result<T, ConfigError>
where
    T: FromStr + Default + PartialEq,
    F: FnOnce(String) -> ConfigError,
{
    match value.parse::<T>() {
        Ok(n) if n != T::default() => Ok(n),
        _ => Err(invalid("expected a number greater than zero".to_string())),
    }
}

fn boolean<F>(value: &str, invalid: F) -> Result<bool, ConfigError>
where
    F: FnOnce(String) -> ConfigError,
{
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid("expected true or false".to_string())),
    }
}
