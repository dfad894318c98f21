//! CLI error type.

use std::fmt;
use std::process;

use cluextract::config::ConfigError;
use cluextract::extract::ExtractError;
use cluextract::geometry::GeometryError;
use cluextract::logging::LoggingError;
use cluextract::service::QueryError;

/// Errors reported by CLI commands.
///
/// Every variant exits with status 1.
#[derive(Debug)]
pub enum CliError {
    /// Invalid or incomplete settings.
    Config(String),
    /// The configuration file could not be read or written.
    ConfigFile(ConfigError),
    /// The AOI file could not be loaded.
    Aoi(GeometryError),
    /// A remote query failed.
    Query(QueryError),
    /// The extract run failed.
    Extract(ExtractError),
    /// Logging could not be set up.
    Logging(LoggingError),
}

impl CliError {
    /// Print the error and exit the process.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);
        process::exit(1);
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "Configuration error: {}", e),
            CliError::Aoi(e) => write!(f, "Could not load area of interest: {}", e),
            CliError::Query(e) => write!(f, "Query failed: {}", e),
            CliError::Extract(e) => write!(f, "Extract failed: {}", e),
            CliError::Logging(e) => write!(f, "Logging error: {}", e),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<GeometryError> for CliError {
    fn from(e: GeometryError) -> Self {
        CliError::Aoi(e)
    }
}

impl From<QueryError> for CliError {
    fn from(e: QueryError) -> Self {
        CliError::Query(e)
    }
}

impl From<ExtractError> for CliError {
    fn from(e: ExtractError) -> Self {
        CliError::Extract(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}
