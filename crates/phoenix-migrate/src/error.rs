//! Error types for phoenix-migrate.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the migration library.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport-level HTTP failure (connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status that is not otherwise classified.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Response status code.
        status: u16,
        /// Response body (possibly truncated).
        body: String,
    },

    /// The server rejected the request with 429.
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimit {
        /// Delay requested by the `Retry-After` header, if any.
        retry_after: Option<Duration>,
    },

    /// Credentials were rejected (401/403).
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Local filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure while exporting from the source platform.
    #[error("export failed: {0}")]
    Export(String),

    /// Failure while importing into the target platform.
    #[error("import failed: {0}")]
    Import(String),

    /// An operator prompt could not be shown or was interrupted.
    #[error("prompt failed: {0}")]
    Prompt(String),
}

impl Error {
    /// HTTP status carried by this error, if it came from a response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::RateLimit { .. } => Some(429),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the target reported that the record already exists.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
