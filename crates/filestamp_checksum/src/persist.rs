//! On-disk form of the checksum cache.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::{CacheRecord, ChecksumError};

/// Reads a persisted record list.
pub(crate) fn read_records(path: &Path) -> Result<Vec<CacheRecord>, ChecksumError> {
    let content = fs::read(path)?;
    serde_json::from_slice(&content).map_err(|e| ChecksumError::corrupted(e.to_string()))
}

/// Process-scoped temporary file used while writing `path`.
pub(crate) fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{}.tmp", std::process::id()));
    PathBuf::from(name)
}

/// Writes `records` to `path` through a temporary file renamed over the
/// existing one. The temporary file never outlives this call.
pub(crate) fn write_records(path: &Path, records: &[CacheRecord]) -> Result<(), ChecksumError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let bytes = serde_json::to_vec_pretty(records)
        .map_err(|e| ChecksumError::Serialization(e.to_string()))?;

    let temp = temp_path_for(path);
    let result = fs::write(&temp, bytes).and_then(|()| fs::rename(&temp, path));

    if temp.exists()
        && let Err(e) = fs::remove_file(&temp)
    {
        warn!("Failed to remove {}: {}", temp.display(), e);
    }

    result.map_err(ChecksumError::from)
}
