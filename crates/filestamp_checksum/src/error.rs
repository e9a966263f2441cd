//! Checksum error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in the checksum system.
///
/// Digest computation itself never surfaces these to callers of the cache;
/// failures there are reported through [`crate::DigestStatus::Failed`].
#[derive(Debug, Error)]
pub enum ChecksumError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted cache file could not be parsed.
    #[error("Corrupted cache: {0}")]
    Corrupted(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The provider does not implement the requested operation.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// The file does not exist.
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),
}

impl ChecksumError {
    /// Creates a corrupted cache error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported(operation.into())
    }
}
