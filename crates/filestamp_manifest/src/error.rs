//! Manifest error types.

use std::path::PathBuf;

use filestamp_checksum::ChecksumError;
use thiserror::Error;

/// Error type for manifest operations.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to parse manifest JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Manifest validation failed: {0}")]
    ValidationError(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checksum error: {0}")]
    Checksum(#[from] ChecksumError),
}
