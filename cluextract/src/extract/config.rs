//! Settings for one extract run.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::{ConfigFile, DEFAULT_FALLBACK_RECORD_LIMIT, DEFAULT_LAYER_URL};
use crate::fetch::{DateFormat, DEFAULT_IDENTIFIER_FIELD};
use crate::geometry::SubdivisionStrategy;
use crate::output::OutputFormat;
use crate::partition::PartitionConfig;
use crate::service::{RetryPolicy, DEFAULT_RETRY_DELAY_SECS, DEFAULT_TIMEOUT_SECS};

/// Configuration for an [`ExtractJob`](super::ExtractJob).
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractConfig {
    /// Feature layer URL.
    pub layer_url: String,

    /// Attribute used to deduplicate features.
    pub identifier_field: String,

    /// Directory the output file is written to.
    pub output_dir: PathBuf,

    pub format: OutputFormat,

    pub date_format: DateFormat,

    /// Drop fetched features that do not intersect the AOI.
    pub select_intersecting: bool,

    /// Record limit when the layer does not report one.
    pub fallback_record_limit: u64,

    pub partition: PartitionConfig,

    pub strategy: SubdivisionStrategy,

    /// Requests fetched concurrently.
    pub parallel: usize,

    /// HTTP request timeout.
    pub timeout: Duration,

    /// Pause before a failed query is resent.
    pub retry_delay: Duration,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            layer_url: DEFAULT_LAYER_URL.to_string(),
            identifier_field: DEFAULT_IDENTIFIER_FIELD.to_string(),
            output_dir: PathBuf::from("."),
            format: OutputFormat::default(),
            date_format: DateFormat::default(),
            select_intersecting: true,
            fallback_record_limit: DEFAULT_FALLBACK_RECORD_LIMIT,
            // Counts go through the query client, which already retries.
            partition: PartitionConfig {
                retry: RetryPolicy::None,
                ..PartitionConfig::default()
            },
            strategy: SubdivisionStrategy::default(),
            parallel: 1,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
        }
    }
}

impl ExtractConfig {
    /// Builds the run configuration from the configuration file.
    pub fn from_config_file(config: &ConfigFile) -> Self {
        let defaults = Self::default();
        Self {
            layer_url: config.service.layer_url.clone(),
            identifier_field: config.service.identifier_field.clone(),
            output_dir: config.output.directory.clone(),
            format: config.output.format,
            date_format: config.output.date_format.clone(),
            select_intersecting: config.output.select_intersecting,
            fallback_record_limit: config.partition.fallback_record_limit,
            partition: PartitionConfig {
                split_margin: config.partition.split_margin,
                max_depth: config.partition.max_depth,
                max_recycles: config.partition.max_recycles,
                ..defaults.partition
            },
            strategy: config.partition.strategy,
            parallel: config.download.parallel.max(1),
            timeout: Duration::from_secs(config.download.timeout),
            retry_delay: Duration::from_secs(config.download.retry_delay),
        }
    }

    /// Set the feature layer URL.
    pub fn with_layer_url(mut self, url: impl Into<String>) -> Self {
        self.layer_url = url.into();
        self
    }

    /// Set the deduplication attribute.
    pub fn with_identifier_field(mut self, field: impl Into<String>) -> Self {
        self.identifier_field = field.into();
        self
    }

    /// Set the output directory.
    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    /// Set the output format.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the subdivision strategy.
    pub fn with_strategy(mut self, strategy: SubdivisionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the split margin used for the first split.
    pub fn with_split_margin(mut self, margin: u64) -> Self {
        self.partition.split_margin = margin.max(1);
        self
    }

    /// Set the number of concurrent fetches.
    pub fn with_parallel(mut self, parallel: usize) -> Self {
        self.parallel = parallel.max(1);
        self
    }

    /// Set the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the pause before a failed query is resent.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Keep or drop features outside the AOI.
    pub fn with_select_intersecting(mut self, select: bool) -> Self {
        self.select_intersecting = select;
        self
    }

    /// Retry policy for remote queries.
    pub fn query_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::retry_once(self.retry_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_config_file_defaults() {
        let from_file = ExtractConfig::from_config_file(&ConfigFile::default());
        assert_eq!(from_file, ExtractConfig::default());
    }

    #[test]
    fn test_partition_does_not_retry_on_its_own() {
        assert_eq!(ExtractConfig::default().partition.retry, RetryPolicy::None);
    }

    #[test]
    fn test_from_config_file() {
        let mut file = ConfigFile::default();
        file.partition.split_margin = 400;
        file.partition.strategy = SubdivisionStrategy::Grid;
        file.download.parallel = 6;
        file.download.retry_delay = 1;
        file.output.format = OutputFormat::GeoJson;

        let config = ExtractConfig::from_config_file(&file);
        assert_eq!(config.partition.split_margin, 400);
        assert_eq!(config.strategy, SubdivisionStrategy::Grid);
        assert_eq!(config.parallel, 6);
        assert_eq!(config.format, OutputFormat::GeoJson);
        assert_eq!(
            config.query_retry_policy(),
            RetryPolicy::retry_once(Duration::from_secs(1))
        );
    }

    #[test]
    fn test_builder() {
        let config = ExtractConfig::default()
            .with_layer_url("https://example.com/FeatureServer/2")
            .with_parallel(0)
            .with_split_margin(0)
            .with_select_intersecting(false);

        assert_eq!(config.layer_url, "https://example.com/FeatureServer/2");
        assert_eq!(config.parallel, 1);
        assert_eq!(config.partition.split_margin, 1);
        assert!(!config.select_intersecting);
    }
}
