//! Extract job errors.

use std::fmt;

use crate::output::OutputError;
use crate::partition::PartitionError;
use crate::service::QueryError;

/// Result type for extract jobs.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Errors that end an extract run.
///
/// Failures of individual requests are not errors; they are listed in the
/// [`ExtractReport`](super::ExtractReport).
#[derive(Debug)]
pub enum ExtractError {
    /// The layer URL or client settings are unusable.
    Setup(QueryError),

    /// Layer metadata could not be loaded.
    Metadata(QueryError),

    /// The AOI could not be partitioned.
    Partition(PartitionError),

    /// The output could not be created or written.
    Output(OutputError),
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup(e) => write!(f, "failed to set up feature service: {}", e),
            Self::Metadata(e) => write!(f, "failed to load layer metadata: {}", e),
            Self::Partition(e) => write!(f, "{}", e),
            Self::Output(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ExtractError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Setup(e) | Self::Metadata(e) => Some(e),
            Self::Partition(e) => Some(e),
            Self::Output(e) => Some(e),
        }
    }
}

impl From<PartitionError> for ExtractError {
    fn from(e: PartitionError) -> Self {
        Self::Partition(e)
    }
}

impl From<OutputError> for ExtractError {
    fn from(e: OutputError) -> Self {
        Self::Output(e)
    }
}
