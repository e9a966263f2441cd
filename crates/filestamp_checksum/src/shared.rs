//! Process-wide cache instance.

use std::sync::OnceLock;

use crate::{ChecksumCache, ChecksumConfig};

/// Lazily constructed cache shared by every caller of [`SharedCache::get`].
///
/// The configuration is read from the environment on first access, see
/// [`ChecksumConfig::from_env`].
pub struct SharedCache {
    cell: OnceLock<ChecksumCache>,
}

impl SharedCache {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    /// Returns the cache, creating it on first use.
    pub fn get(&self) -> &ChecksumCache {
        self.cell
            .get_or_init(|| ChecksumCache::new(ChecksumConfig::from_env()))
    }

    /// Installs a cache built from `config`.
    ///
    /// Returns false, leaving the existing cache in place, if one was
    /// already created.
    pub fn init(&self, config: ChecksumConfig) -> bool {
        self.cell.set(ChecksumCache::new(config)).is_ok()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl Default for SharedCache {
    fn default() -> Self {
        Self::new()
    }
}

static SHARED: SharedCache = SharedCache::new();

/// Returns the process-wide checksum cache.
pub fn shared_cache() -> &'static ChecksumCache {
    SHARED.get()
}
