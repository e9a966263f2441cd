//! A single file described by a manifest.

use std::fs;
use std::path::{Path, PathBuf};

use filestamp_checksum::{Checksum, DigestStatus, FileHasher, shared_cache};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use crate::ManifestError;

/// How a new entry obtains its digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StampMode {
    /// Hash on the calling thread if no fresh digest is cached.
    #[default]
    Blocking,
    /// Use a fresh cached digest if there is one, otherwise queue the file
    /// for hashing and leave the entry unstamped.
    Background,
}

/// The content identity of an entry: identical files share it regardless of
/// where they live.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryIdentity {
    pub file_stamp: String,
    pub file_size: u64,
}

/// Expected name, location, digest and size of one file.
///
/// `file_path` is the directory relative to the manifest root and is never
/// rooted. An empty `file_stamp` means no digest was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    file_name: String,
    #[serde(deserialize_with = "deserialize_file_path")]
    file_path: String,
    file_stamp: String,
    file_size: u64,
}

impl ManifestEntry {
    /// Creates an entry from recorded values. A rooted `file_path` has its
    /// root stripped.
    pub fn new(
        file_name: impl Into<String>,
        file_path: impl Into<String>,
        file_stamp: impl Into<String>,
        file_size: u64,
    ) -> Self {
        let mut entry = Self {
            file_name: file_name.into(),
            file_path: String::new(),
            file_stamp: file_stamp.into(),
            file_size,
        };
        entry.set_file_path(file_path);
        entry
    }

    /// Describes an existing file located under `base_dir`, stamped through
    /// `checksum`.
    pub fn from_file(
        file: &Path,
        base_dir: &Path,
        checksum: &dyn Checksum,
        mode: StampMode,
    ) -> Result<Self, ManifestError> {
        let metadata = match fs::metadata(file) {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => return Err(ManifestError::FileNotFound(file.to_path_buf())),
        };

        let file_name = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| ManifestError::FileNotFound(file.to_path_buf()))?;

        let parent = file.parent().unwrap_or(Path::new(""));
        let relative_dir = parent.strip_prefix(base_dir).unwrap_or(parent);

        let status = match mode {
            StampMode::Blocking => checksum.digest_of_file_blocking(file),
            StampMode::Background => checksum.digest_of_file(file),
        };
        let file_stamp = match status {
            DigestStatus::Ready(digest) => digest,
            DigestStatus::Pending => {
                debug!("{} queued for hashing, entry left unstamped", file.display());
                String::new()
            }
            DigestStatus::Failed(reason) => {
                warn!("Could not stamp {}: {}", file.display(), reason);
                String::new()
            }
        };

        Ok(Self::new(
            file_name,
            relative_dir.to_string_lossy(),
            file_stamp,
            metadata.len(),
        ))
    }

    /// [`ManifestEntry::from_file`] through the process-wide cache.
    pub fn from_shared_cache(
        file: &Path,
        base_dir: &Path,
        mode: StampMode,
    ) -> Result<Self, ManifestError> {
        Self::from_file(file, base_dir, shared_cache(), mode)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn file_stamp(&self) -> &str {
        &self.file_stamp
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Sets the relative directory, stripping any root or drive prefix.
    pub fn set_file_path(&mut self, file_path: impl Into<String>) {
        self.file_path = strip_root(&file_path.into());
    }

    /// Location of the file relative to the manifest root.
    pub fn relative_path(&self) -> PathBuf {
        Path::new(&self.file_path).join(&self.file_name)
    }

    /// Returns true if a digest was recorded.
    pub fn is_stamped(&self) -> bool {
        !self.file_stamp.is_empty()
    }

    pub fn identity(&self) -> EntryIdentity {
        EntryIdentity {
            file_stamp: self.file_stamp.clone(),
            file_size: self.file_size,
        }
    }

    /// Hex form of the stamp, usable as a directory name.
    pub fn file_stamp_as_directory_name(&self) -> Option<String> {
        if FileHasher::is_failure(&self.file_stamp) {
            return None;
        }
        FileHasher::to_hex(&self.file_stamp)
    }

    /// Checks the file under `base_dir` against this entry, using the
    /// process-wide cache.
    pub fn verify(&self, base_dir: &Path) -> bool {
        self.verify_with(base_dir, shared_cache())
    }

    /// Checks the file under `base_dir` against this entry.
    ///
    /// Without a recorded stamp only existence is checked. Otherwise the
    /// file's digest is derived now and must equal the stamp.
    pub fn verify_with(&self, base_dir: &Path, checksum: &dyn Checksum) -> bool {
        let path = base_dir.join(self.relative_path());
        if !self.is_stamped() {
            return path.is_file();
        }
        if FileHasher::is_failure(&self.file_stamp) {
            return false;
        }

        match checksum.digest_of_file_blocking(&path) {
            DigestStatus::Ready(digest) => digest == self.file_stamp,
            status => {
                debug!("{} did not verify: {}", path.display(), status);
                false
            }
        }
    }
}

/// Converts `path` to a forward-slash relative path with no root, no drive
/// prefix, and no `.` or `..` components.
///
/// A leading single letter followed by `:` is always read as a drive, since
/// manifests travel between platforms.
pub fn sanitize_relative_path(path: &str) -> String {
    let mut current = path.replace('\\', "/");
    loop {
        let rest = match current.as_bytes() {
            [drive, b':', ..] if drive.is_ascii_alphabetic() => &current[2..],
            _ => current.as_str(),
        };
        let next = rest
            .split('/')
            .filter(|part| !part.is_empty() && *part != "." && *part != "..")
            .collect::<Vec<_>>()
            .join("/");
        if next == current {
            return next;
        }
        current = next;
    }
}

fn deserialize_file_path<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(strip_root(&raw))
}

fn strip_root(raw: &str) -> String {
    let sanitized = sanitize_relative_path(raw);
    if sanitized != raw.replace('\\', "/").trim_end_matches('/') {
        warn!(
            "Manifest paths must be relative; stripped {:?} to {:?}",
            raw, sanitized
        );
    }
    sanitized
}
