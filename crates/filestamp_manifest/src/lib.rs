//! # filestamp_manifest
//!
//! Manifests describe a set of files by name, relative location, digest and
//! size, and verify a directory against that description.
//!
//! Digests come from any [`filestamp_checksum::Checksum`] provider. The
//! `verify` and `from_shared_cache` conveniences use the process-wide cache.
//!
//! The portable text form is compact JSON meant to be embedded in other
//! documents. [`Manifest::to_document`] emits the standalone form, which
//! carries a `$schema` declaration.

mod entry;
mod error;
mod manifest;

pub use entry::{EntryIdentity, ManifestEntry, StampMode, sanitize_relative_path};
pub use error::ManifestError;
pub use manifest::{MANIFEST_SCHEMA_URL, Manifest};

use jsonschema::Validator;
use serde_json::Value;
use std::sync::OnceLock;

// Path is relative to this file: ../../../schemas/v1/manifest.json
const MANIFEST_SCHEMA_JSON: &str = include_str!("../../../schemas/v1/manifest.json");

static SCHEMA: OnceLock<Option<Validator>> = OnceLock::new();

/// Validates manifest JSON against the embedded schema and deserializes it.
///
/// A leading byte order mark and a `$schema` key are accepted and ignored.
pub fn validate_manifest(json_str: &str) -> Result<Manifest, ManifestError> {
    let json_str = json_str.strip_prefix('\u{feff}').unwrap_or(json_str);
    let mut instance: Value = serde_json::from_str(json_str)?;
    if let Some(object) = instance.as_object_mut() {
        object.remove("$schema");
    }

    let schema = SCHEMA
        .get_or_init(|| {
            let schema_json: Value = serde_json::from_str(MANIFEST_SCHEMA_JSON).ok()?;
            Validator::new(&schema_json).ok()
        })
        .as_ref()
        .ok_or_else(|| ManifestError::ValidationError("Embedded schema is invalid".into()))?;

    if let Err(e) = schema.validate(&instance) {
        let error_msg = format!("{} at {}", e, e.instance_path());
        return Err(ManifestError::ValidationError(error_msg));
    }

    Ok(serde_json::from_value(instance)?)
}
