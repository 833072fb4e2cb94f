//! Error types for the application

use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Telemetry error: {0}")]
    Telemetry(String),

    #[error("Telemetry source did not respond within {timeout_secs}s")]
    TelemetryTimeout { timeout_secs: u64 },

    #[error("No direct power collaborator available: {0}")]
    AdapterUnavailable(String),

    #[error("History append out of order: last stored timestamp {last}, attempted {attempted}")]
    NonMonotonicTimestamp { last: i64, attempted: i64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;
