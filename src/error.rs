//! # Error Types
//!
//! Custom error types for the LPWAN tracker using `thiserror`.

use thiserror::Error;

/// Main error type for the LPWAN tracker
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Uplink payload could not be built or decoded
    #[error("Payload error: {0}")]
    Payload(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Serial console port could not be opened
    #[error("Console port not found: {0}")]
    ConsolePortNotFound(String),

    /// Flag record storage errors
    #[error("Storage error for record {record}: {source}")]
    Storage {
        record: String,
        #[source]
        source: std::io::Error,
    },

    /// Uplink journal errors
    #[error("Journal error: {0}")]
    Journal(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the LPWAN tracker
pub type Result<T> = std::result::Result<T, TrackerError>;
