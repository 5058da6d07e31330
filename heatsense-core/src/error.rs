//! Error types for the heatsense core library
//!
//! Cache faults never reach pipeline code as errors: the artifact cache
//! converts them into misses. The variants here surface from geometry
//! validation, configuration, and direct backend access.

use thiserror::Error;

/// Main error type for core operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// Filesystem error while reading or writing cache entries
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// GeoJSON encoding or decoding failed
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] serde_json::Error),

    /// Binary blob encoding or decoding failed
    #[error("Binary encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    /// Geometry is malformed or of an unsupported type
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Configuration value out of range
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Stored payload does not match the requested artifact kind
    #[error("Artifact kind mismatch: expected {expected}, found {found}")]
    KindMismatch { expected: String, found: String },

    /// A lock guarding in-memory state was poisoned by a panicking thread
    #[error("Cache lock poisoned")]
    LockPoisoned,

    /// Blocking task could not be joined
    #[error("Background task failed: {0}")]
    TaskError(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl From<String> for CoreError {
    fn from(s: String) -> Self {
        CoreError::Other(s)
    }
}

impl From<&str> for CoreError {
    fn from(s: &str) -> Self {
        CoreError::Other(s.to_string())
    }
}

impl From<tokio::task::JoinError> for CoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        CoreError::TaskError(err.to_string())
    }
}
