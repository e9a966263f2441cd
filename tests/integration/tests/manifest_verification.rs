//! Manifests built, persisted and verified against a shared checksum cache.

use std::fs;
use std::path::Path;
use std::time::Duration;

use filestamp_checksum::{ChecksumCache, ChecksumConfig};
use filestamp_manifest::{Manifest, ManifestEntry, ManifestError, StampMode};
use pretty_assertions::assert_eq;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn populate(root: &Path) {
    fs::create_dir_all(root.join("bin")).unwrap();
    fs::create_dir_all(root.join("share").join("maps")).unwrap();
    fs::write(root.join("bin").join("viewer"), "executable bytes").unwrap();
    fs::write(root.join("share").join("maps").join("world.idx"), "index").unwrap();
    fs::write(root.join("README"), "read me").unwrap();
}

#[test]
fn verification_reuses_persisted_digests() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let install = dir.path().join("install");
    let cache_file = dir.path().join("checksums.json");
    populate(&install);

    let config = ChecksumConfig::new()
        .with_cache_file(&cache_file)
        .with_reload_retry_delay(Duration::from_millis(10));

    let builder = ChecksumCache::new(config.clone());
    let manifest =
        Manifest::from_directory(&install, "viewer-3.0", &builder, StampMode::Blocking).unwrap();
    assert_eq!(manifest.entries.len(), 3);
    builder.save_cache().unwrap();

    let verifier = ChecksumCache::new(config);
    assert!(manifest.verify_with(&install, &verifier));
    assert_eq!(verifier.stats().computations, 0);

    fs::write(install.join("README"), "tampered").unwrap();
    assert!(!manifest.verify_with(&install, &verifier));
    let failing: Vec<&str> = manifest
        .failing_entries(&install, &verifier)
        .into_iter()
        .map(ManifestEntry::file_name)
        .collect();
    assert_eq!(failing, vec!["README"]);
}

#[test]
fn manifest_document_survives_a_round_trip() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let install = dir.path().join("install");
    populate(&install);
    let cache = ChecksumCache::new(ChecksumConfig::new());

    let mut manifest =
        Manifest::from_directory(&install, "viewer-3.0", &cache, StampMode::Blocking).unwrap();
    manifest.command_line = "bin/viewer --fullscreen".to_string();

    let document = dir.path().join("viewer-3.0.json");
    manifest.write_to_file(&document).unwrap();
    let loaded = Manifest::read_from_file(&document).unwrap();
    assert_eq!(loaded, manifest);
    assert_eq!(loaded.command_line, manifest.command_line);

    let embedded = format!("\u{feff}{}", manifest.to_portable_text().unwrap());
    assert_eq!(Manifest::from_portable_text(&embedded).unwrap(), manifest);

    // Verifies against a copy installed elsewhere.
    let mirror = dir.path().join("mirror");
    populate(&mirror);
    assert!(loaded.verify_with(&mirror, &cache));
}

#[test]
fn corrupt_manifest_is_reported() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let document = dir.path().join("broken.json");
    fs::write(&document, r#"{"id":"x","entries":[{"fileName":"a"}]}"#).unwrap();

    assert!(matches!(
        Manifest::read_from_file(&document),
        Err(ManifestError::ValidationError(_))
    ));
}

#[test]
fn local_copy_is_found_by_stamp() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let install = dir.path().join("install");
    populate(&install);
    let cache = ChecksumCache::new(ChecksumConfig::new());

    let manifest =
        Manifest::from_directory(&install, "viewer-3.0", &cache, StampMode::Blocking).unwrap();
    let index = manifest
        .entries
        .iter()
        .position(|entry| entry.file_name() == "world.idx")
        .unwrap();

    let resolved = manifest.resolve_local_file(index, &cache).unwrap().unwrap();
    assert!(resolved.ends_with("share/maps/world.idx"));

    let text = manifest.to_portable_text().unwrap();
    assert_eq!(
        Manifest::resolve_local_file_in_text(&text, index, &cache).unwrap(),
        Some(resolved)
    );
}

#[test]
fn entries_with_equal_content_share_identity() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.bin"), "same").unwrap();
    fs::create_dir(dir.path().join("nested")).unwrap();
    fs::write(dir.path().join("nested").join("b.bin"), "same").unwrap();
    let cache = ChecksumCache::new(ChecksumConfig::new());

    let manifest =
        Manifest::from_directory(dir.path(), "dupes", &cache, StampMode::Blocking).unwrap();
    let a = &manifest.entries[0];
    let b = &manifest.entries[1];
    assert_ne!(a, b);
    assert_eq!(a.identity(), b.identity());
    assert_eq!(manifest.find_by_identity(&b.identity()), Some(a));
}
