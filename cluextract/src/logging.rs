//! Logging setup.
//!
//! Log records go to two places: the console (stderr, so progress bars on
//! stdout stay readable) and a daily rolling file under the log directory.
//! The filter comes from `RUST_LOG`, falling back to `info` (or `debug` in
//! verbose mode).

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Prefix of log file names (`cluextract.log.2024-01-31`).
pub const LOG_FILE_PREFIX: &str = "cluextract.log";

/// Errors setting up logging.
#[derive(Debug)]
pub enum LoggingError {
    /// The log directory could not be created.
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// A global subscriber was already installed.
    AlreadyInitialized(String),
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateDirFailed { path, source } => {
                write!(
                    f,
                    "failed to create log directory {}: {}",
                    path.display(),
                    source
                )
            }
            Self::AlreadyInitialized(msg) => write!(f, "logging already initialized: {}", msg),
        }
    }
}

impl std::error::Error for LoggingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CreateDirFailed { source, .. } => Some(source),
            Self::AlreadyInitialized(_) => None,
        }
    }
}

/// Keeps the background log writer alive.
///
/// Buffered records are flushed when the guard is dropped, so hold it until
/// the program exits.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    log_dir: PathBuf,
}

impl LoggingGuard {
    /// Directory the log files are written to.
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

/// Default filter directive for the given verbosity.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Installs the global subscriber.
///
/// # Arguments
///
/// * `log_dir` - Directory for the daily log files (created if missing)
/// * `verbose` - Use `debug` instead of `info` when `RUST_LOG` is unset
pub fn init_logging(log_dir: &Path, verbose: bool) -> Result<LoggingGuard, LoggingError> {
    fs::create_dir_all(log_dir).map_err(|e| LoggingError::CreateDirFailed {
        path: log_dir.to_path_buf(),
        source: e,
    })?;

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(true),
        )
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
        log_dir: log_dir.to_path_buf(),
    })
}
