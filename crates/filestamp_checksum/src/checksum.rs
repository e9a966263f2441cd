//! Pluggable checksum providers.

use std::path::{Path, PathBuf};

use crate::{ChecksumCache, ChecksumError, DigestStatus, FileHasher};

/// A source of file and string digests.
///
/// Every provider yields the same digest format, so their outputs are
/// interchangeable.
pub trait Checksum: Send + Sync {
    /// Digest of a UTF-8 string.
    fn digest_of_string(&self, data: &str) -> String;

    /// Digest of a file, possibly still being computed.
    fn digest_of_file(&self, path: &Path) -> DigestStatus;

    /// Digest of a file, computed on the calling thread if necessary.
    fn digest_of_file_blocking(&self, path: &Path) -> DigestStatus;

    /// Locates a file with the given digest.
    fn find_file_by_digest(&self, digest: &str) -> Result<Option<PathBuf>, ChecksumError>;
}

impl Checksum for ChecksumCache {
    fn digest_of_string(&self, data: &str) -> String {
        ChecksumCache::digest_of_string(self, data)
    }

    fn digest_of_file(&self, path: &Path) -> DigestStatus {
        ChecksumCache::digest_of_file(self, path)
    }

    fn digest_of_file_blocking(&self, path: &Path) -> DigestStatus {
        ChecksumCache::digest_of_file_blocking(self, path)
    }

    fn find_file_by_digest(&self, digest: &str) -> Result<Option<PathBuf>, ChecksumError> {
        Ok(ChecksumCache::find_file_by_digest(self, digest))
    }
}

/// Hashes on every request without caching anything.
///
/// Useful where a persisted cache is unwanted. It cannot search by digest.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyHasher;

impl Checksum for LegacyHasher {
    fn digest_of_string(&self, data: &str) -> String {
        FileHasher::compute_str(data)
    }

    fn digest_of_file(&self, path: &Path) -> DigestStatus {
        self.digest_of_file_blocking(path)
    }

    fn digest_of_file_blocking(&self, path: &Path) -> DigestStatus {
        let digest = FileHasher::compute_file_or_failure(path);
        if FileHasher::is_failure(&digest) {
            DigestStatus::failed(format!("{} could not be hashed", path.display()))
        } else {
            DigestStatus::Ready(digest)
        }
    }

    fn find_file_by_digest(&self, _digest: &str) -> Result<Option<PathBuf>, ChecksumError> {
        Err(ChecksumError::unsupported("find_file_by_digest"))
    }
}
