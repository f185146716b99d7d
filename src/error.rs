//! Error types for Halo dispatch

use thiserror::Error;

/// Result type alias for Halo operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Halo dispatch
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Webhook authentication failure (bad signature)
    #[error("auth error: {0}")]
    Auth(String),

    /// Unparseable webhook body or missing required field
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// AI triage gateway failure or timeout
    #[error("triage error: {0}")]
    Triage(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
