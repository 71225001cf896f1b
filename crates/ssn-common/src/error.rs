//! Error types shared across the SSN builder

use thiserror::Error;

/// Result type alias for SSN operations
pub type Result<T> = std::result::Result<T, SsnError>;

/// Main error type for the SSN builder's shared crate
#[derive(Error, Debug)]
pub enum SsnError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Accession not found: {0}")]
    AccessionNotFound(String),

    #[error("Invalid accession format: {0}")]
    InvalidAccession(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}
