//! Error types for feature service queries.

use thiserror::Error;

/// ArcGIS error code for an invalid or expired token.
pub const INVALID_TOKEN_CODE: i64 = 498;

/// ArcGIS error code for a request that needs a token but sent none.
pub const TOKEN_REQUIRED_CODE: i64 = 499;

/// Result type for service operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors that can occur while querying a feature service.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryError {
    /// Transport-level failure (connection, timeout, non-2xx status).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The service answered with an `{"error": {...}}` object.
    #[error("service error {code}: {message}")]
    Service { code: i64, message: String },

    /// The service answered with an empty JSON object.
    #[error("service returned an empty response")]
    EmptyResponse,

    /// The response was not the JSON shape we expected.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A token could not be generated.
    #[error("credential error: {0}")]
    Credential(String),

    /// Every attempt allowed by the retry ladder failed.
    #[error("query to {url} failed after {attempts} attempts: {reason}")]
    Exhausted {
        url: String,
        attempts: u32,
        reason: String,
    },
}

impl QueryError {
    /// Whether the error means the token must be regenerated.
    pub fn is_token_error(&self) -> bool {
        match self {
            QueryError::Service { code, message } => {
                *code == INVALID_TOKEN_CODE
                    || *code == TOKEN_REQUIRED_CODE
                    || message.eq_ignore_ascii_case("invalid token")
            }
            _ => false,
        }
    }
}
