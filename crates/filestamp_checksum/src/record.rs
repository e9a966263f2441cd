//! Cache record types.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A modification time, stored as seconds and nanoseconds since the UNIX epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub secs: u64,
    pub nanos: u32,
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        let since_epoch = time.duration_since(UNIX_EPOCH).unwrap_or_default();
        Self {
            secs: since_epoch.as_secs(),
            nanos: since_epoch.subsec_nanos(),
        }
    }
}

/// The (size, modified time) pair used as the freshness signal for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileStat {
    pub size: u64,
    pub modified: Timestamp,
}

impl FileStat {
    /// Reads the current stat of a regular file.
    pub fn of(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }
        Ok(Self {
            size: metadata.len(),
            modified: metadata.modified()?.into(),
        })
    }
}

/// A cached digest for a single file.
///
/// Records are immutable once stored; an update replaces the whole record.
/// An empty `digest` means a computation is pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Absolute path of the file. Always equal to the record's map key.
    pub path: PathBuf,

    /// Base64 SHA-256 digest, or empty while pending.
    pub digest: String,

    /// File size in bytes when the digest was taken.
    pub size: u64,

    /// File modification time when the digest was taken.
    pub modified: Timestamp,
}

impl CacheRecord {
    /// Creates a record whose digest has not been computed yet.
    pub fn pending(path: impl Into<PathBuf>, stat: FileStat) -> Self {
        Self::with_digest(path, String::new(), stat)
    }

    /// Creates a record holding a computed digest.
    pub fn with_digest(path: impl Into<PathBuf>, digest: impl Into<String>, stat: FileStat) -> Self {
        Self {
            path: path.into(),
            digest: digest.into(),
            size: stat.size,
            modified: stat.modified,
        }
    }

    /// Returns true while the digest is still being computed.
    pub fn is_pending(&self) -> bool {
        self.digest.is_empty()
    }

    /// Returns the recorded stat.
    pub fn stat(&self) -> FileStat {
        FileStat {
            size: self.size,
            modified: self.modified,
        }
    }

    /// Checks the recorded stat against `current`.
    pub fn matches(&self, current: &FileStat) -> bool {
        self.stat() == *current
    }

    /// Returns true if the file on disk no longer matches the recorded stat.
    ///
    /// A file that cannot be stat'ed counts as expired.
    pub fn is_expired(&self) -> bool {
        match FileStat::of(&self.path) {
            Ok(current) => !self.matches(&current),
            Err(_) => true,
        }
    }
}
