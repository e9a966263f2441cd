//! Manifests: identified sets of file entries.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use filestamp_checksum::{Checksum, shared_cache};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::{EntryIdentity, ManifestEntry, ManifestError, StampMode, validate_manifest};

/// `$schema` value written into standalone manifest documents.
pub const MANIFEST_SCHEMA_URL: &str =
    "https://github.com/simorgh3196/filestamp/schemas/v1/manifest.json";

/// An identified set of files.
///
/// Equality compares `id` and the entries as a set: order is irrelevant and
/// duplicates are tolerated. The installation directory and command line do
/// not take part.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub installation_directory: String,
    #[serde(default)]
    pub command_line: String,
    pub id: String,
    pub entries: Vec<ManifestEntry>,
}

#[derive(Serialize)]
struct Document<'a> {
    #[serde(rename = "$schema")]
    schema: &'static str,
    #[serde(flatten)]
    manifest: &'a Manifest,
}

impl Manifest {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Builds a manifest of every regular file under `dir`, in file name
    /// order.
    pub fn from_directory(
        dir: &Path,
        id: impl Into<String>,
        checksum: &dyn Checksum,
        mode: StampMode,
    ) -> Result<Self, ManifestError> {
        if !dir.is_dir() {
            return Err(ManifestError::FileNotFound(dir.to_path_buf()));
        }

        let mut manifest = Self::new(id);
        manifest.installation_directory = dir.to_string_lossy().into_owned();

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| ManifestError::Io(io::Error::from(e)))?;
            if !entry.file_type().is_file() {
                continue;
            }
            manifest
                .entries
                .push(ManifestEntry::from_file(entry.path(), dir, checksum, mode)?);
        }

        debug!(
            "Built manifest {} with {} entries from {}",
            manifest.id,
            manifest.entries.len(),
            dir.display()
        );
        Ok(manifest)
    }

    /// Sum of all entry sizes.
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(ManifestEntry::file_size).sum()
    }

    /// Verifies every entry against `base_dir` using the process-wide cache.
    pub fn verify(&self, base_dir: &Path) -> bool {
        self.verify_with(base_dir, shared_cache())
    }

    /// Returns true if every entry verifies. Stops at the first failure.
    pub fn verify_with(&self, base_dir: &Path, checksum: &dyn Checksum) -> bool {
        self.entries
            .iter()
            .all(|entry| entry.verify_with(base_dir, checksum))
    }

    /// Entries that do not verify against `base_dir`.
    pub fn failing_entries(&self, base_dir: &Path, checksum: &dyn Checksum) -> Vec<&ManifestEntry> {
        self.entries
            .iter()
            .filter(|entry| !entry.verify_with(base_dir, checksum))
            .collect()
    }

    pub fn find_by_identity(&self, identity: &EntryIdentity) -> Option<&ManifestEntry> {
        self.entries.iter().find(|entry| entry.identity() == *identity)
    }

    /// Finds a local file whose content matches entry `index`.
    ///
    /// Returns `Ok(None)` for an out-of-range index, an unstamped entry, or
    /// when no known file carries the stamp.
    pub fn resolve_local_file(
        &self,
        index: usize,
        checksum: &dyn Checksum,
    ) -> Result<Option<PathBuf>, ManifestError> {
        let Some(entry) = self.entries.get(index) else {
            return Ok(None);
        };
        if !entry.is_stamped() {
            return Ok(None);
        }
        Ok(checksum.find_file_by_digest(entry.file_stamp())?)
    }

    /// [`Manifest::resolve_local_file`] for a manifest held as portable text.
    pub fn resolve_local_file_in_text(
        text: &str,
        index: usize,
        checksum: &dyn Checksum,
    ) -> Result<Option<PathBuf>, ManifestError> {
        Self::from_portable_text(text)?.resolve_local_file(index, checksum)
    }

    /// Compact JSON without a schema declaration, for embedding.
    pub fn to_portable_text(&self) -> Result<String, ManifestError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Pretty JSON with a `$schema` declaration, for standalone files.
    pub fn to_document(&self) -> Result<String, ManifestError> {
        let document = Document {
            schema: MANIFEST_SCHEMA_URL,
            manifest: self,
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Parses either the portable text or a standalone document.
    pub fn from_portable_text(text: &str) -> Result<Self, ManifestError> {
        validate_manifest(text).inspect_err(|e| error!("Failed to read manifest: {}", e))
    }

    pub fn read_from_file(path: &Path) -> Result<Self, ManifestError> {
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ManifestError::FileNotFound(path.to_path_buf()),
            _ => ManifestError::Io(e),
        })?;
        Self::from_portable_text(&text)
    }

    pub fn write_to_file(&self, path: &Path) -> Result<(), ManifestError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_document()?)?;
        info!("Wrote manifest {} to {}", self.id, path.display());
        Ok(())
    }
}

impl PartialEq for Manifest {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.entries.iter().all(|entry| other.entries.contains(entry))
            && other.entries.iter().all(|entry| self.entries.contains(entry))
    }
}

impl Eq for Manifest {}
