//! # filestamp_checksum
//!
//! Cached SHA-256 digests of files, encoded as base64.
//!
//! Hashing large files repeatedly is expensive, so [`ChecksumCache`] keeps a
//! digest per absolute path and reuses it until the file changes.
//!
//! ## Freshness
//!
//! A digest is fresh while the file's size and modification time still
//! equal the values captured when it was computed. Contents are never
//! re-read to check freshness.
//!
//! ## Computation
//!
//! Non-blocking requests return [`DigestStatus::Pending`] and queue the file
//! on a single background worker, so at most one background read+hash runs
//! at a time. Blocking requests hash on the calling thread.
//!
//! ## Storage
//!
//! The cache can be persisted as JSON and shared between processes. Saves
//! merge what other writers stored since the last read, then atomically
//! replace the file.

mod cache;
mod chain;
mod checksum;
mod config;
mod digest;
mod error;
mod persist;
mod record;
mod shared;
mod status;

pub use cache::{CacheStats, ChecksumCache};
pub use chain::PendingDigest;
pub use checksum::{Checksum, LegacyHasher};
pub use config::{CACHE_FILE_ENV, ChecksumConfig};
pub use digest::{DIGEST_FAILURE, FileHasher};
pub use error::ChecksumError;
pub use record::{CacheRecord, FileStat, Timestamp};
pub use shared::{SharedCache, shared_cache};
pub use status::DigestStatus;
