//! Shared setup for commands that talk to the feature service.

use cluextract::config::{config_file_path, ConfigFile};
use cluextract::logging::{init_logging, LoggingGuard};
use tracing::info;

use crate::error::CliError;

/// Loaded configuration plus the logging guard for one command.
pub struct CliRunner {
    config: ConfigFile,
    logging: LoggingGuard,
}

impl CliRunner {
    /// Load the configuration file and start logging.
    ///
    /// A configuration file with invalid values is an error; a missing file
    /// gives the defaults.
    pub fn new(verbose: bool) -> Result<Self, CliError> {
        let config = ConfigFile::load()?;
        let logging = init_logging(&config.logging.directory, verbose)?;
        Ok(Self { config, logging })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log the command being run.
    pub fn log_startup(&self, command: &str) {
        info!(
            version = cluextract::VERSION,
            command,
            config = %config_file_path().display(),
            logs = %self.logging.log_dir().display(),
            "CLU Extract starting"
        );
    }
}
