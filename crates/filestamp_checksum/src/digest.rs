//! Stateless SHA-256 digests, encoded as base64 text.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Sentinel returned by the string-returning hashing paths when a digest
/// could not be produced.
pub const DIGEST_FAILURE: &str = "ERROR";

const READ_BUFFER_SIZE: usize = 64 * 1024;

pub struct FileHasher;

impl FileHasher {
    /// Computes the base64-encoded SHA-256 digest of bytes.
    pub fn compute(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        STANDARD.encode(hasher.finalize())
    }

    /// Computes the digest of a string's UTF-8 bytes.
    pub fn compute_str(data: &str) -> String {
        Self::compute(data.as_bytes())
    }

    /// Streams a reader through the hasher.
    pub fn compute_reader<R: Read>(mut reader: R) -> io::Result<String> {
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];
        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buffer[..read]);
        }
        Ok(STANDARD.encode(hasher.finalize()))
    }

    /// Computes the digest of a file's contents.
    pub fn compute_file(path: &Path) -> io::Result<String> {
        let file = File::open(path)?;
        Self::compute_reader(file)
    }

    /// Like [`FileHasher::compute_file`], but reports failure as [`DIGEST_FAILURE`].
    pub fn compute_file_or_failure(path: &Path) -> String {
        match Self::compute_file(path) {
            Ok(digest) => digest,
            Err(e) => {
                debug!("Failed to hash {}: {}", path.display(), e);
                DIGEST_FAILURE.to_string()
            }
        }
    }

    /// Returns true if `digest` is empty or the failure sentinel.
    pub fn is_failure(digest: &str) -> bool {
        digest.is_empty() || digest == DIGEST_FAILURE
    }

    /// Re-encodes a base64 digest as lowercase hex.
    ///
    /// Returns `None` when `digest` is not valid base64.
    pub fn to_hex(digest: &str) -> Option<String> {
        STANDARD.decode(digest).ok().map(hex::encode)
    }
}
