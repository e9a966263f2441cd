//! End-to-end behavior of the checksum cache through its public API.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use filestamp_checksum::{
    Checksum, ChecksumCache, ChecksumConfig, DigestStatus, FileHasher, LegacyHasher,
};
use pretty_assertions::assert_eq;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config() -> ChecksumConfig {
    ChecksumConfig::new().with_reload_retry_delay(Duration::from_millis(10))
}

fn write_files(dir: &Path, count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| {
            let path = dir.join(format!("file-{:02}.dat", i));
            fs::write(&path, format!("payload number {}", i).repeat(i + 1)).unwrap();
            path
        })
        .collect()
}

fn wait_until_fresh(cache: &ChecksumCache, path: &Path) -> String {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(digest) = cache.cached_digest_if_fresh(path) {
            return digest;
        }
        assert!(Instant::now() < deadline, "{} never settled", path.display());
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn unseen_files_are_pending_then_fresh() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let files = write_files(dir.path(), 12);
    let cache = ChecksumCache::new(config());

    for path in &files {
        assert_eq!(cache.digest_of_file(path), DigestStatus::Pending);
    }

    for path in &files {
        let expected = FileHasher::compute(&fs::read(path).unwrap());
        assert_eq!(wait_until_fresh(&cache, path), expected);
    }
    assert_eq!(cache.stats().computations, 12);
    assert_eq!(cache.stats().pending, 0);
}

#[test]
fn cache_and_legacy_hasher_agree() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let files = write_files(dir.path(), 4);
    let cache = ChecksumCache::new(config());
    let legacy = LegacyHasher;

    for path in &files {
        assert_eq!(
            Checksum::digest_of_file_blocking(&cache, path),
            legacy.digest_of_file_blocking(path)
        );
    }
}

#[test]
fn persisted_cache_is_shared_between_instances() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let cache_file = dir.path().join("state").join("checksums.json");
    let files = write_files(dir.path(), 5);

    let writer = ChecksumCache::new(config().with_cache_file(&cache_file));
    let digests: Vec<String> = files
        .iter()
        .map(|path| writer.digest_of_file_blocking(path).into_digest().unwrap())
        .collect();
    assert_eq!(writer.save_cache().unwrap(), 5);

    let reader = ChecksumCache::new(config().with_cache_file(&cache_file));
    assert_eq!(reader.len(), 5);
    for (path, digest) in files.iter().zip(&digests) {
        assert_eq!(reader.cached_digest_if_fresh(path).as_ref(), Some(digest));
    }
    assert_eq!(reader.stats().computations, 0);

    // A modified file is recomputed, the rest stay cached.
    fs::write(&files[2], "rewritten").unwrap();
    assert_eq!(reader.cached_digest_if_fresh(&files[2]), None);
    assert_eq!(
        reader.digest_of_file_blocking(&files[2]),
        DigestStatus::Ready(FileHasher::compute_str("rewritten"))
    );
    assert_eq!(reader.stats().computations, 1);
}

#[test]
fn saves_from_two_instances_merge() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let cache_file = dir.path().join("checksums.json");
    let files = write_files(dir.path(), 4);

    let first = ChecksumCache::new(config().with_cache_file(&cache_file));
    let second = ChecksumCache::new(config().with_cache_file(&cache_file));

    first.digest_of_file_blocking(&files[0]);
    first.digest_of_file_blocking(&files[1]);
    first.save_cache().unwrap();

    second.digest_of_file_blocking(&files[2]);
    second.digest_of_file_blocking(&files[3]);
    assert_eq!(second.save_cache().unwrap(), 4);

    let fresh = ChecksumCache::new(config().with_cache_file(&cache_file));
    for path in &files {
        assert!(fresh.cached_digest_if_fresh(path).is_some());
    }
}

#[test]
fn config_file_drives_construction() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let cache_file = dir.path().join("checksums.json");
    let config_file = dir.path().join("checksum-config.json");
    fs::write(
        &config_file,
        format!(
            r#"{{ "cache_file": {:?}, "reload_retry_delay_ms": 5, "worker_thread_name": "it-hasher" }}"#,
            cache_file.to_string_lossy()
        ),
    )
    .unwrap();

    let cache = ChecksumCache::new(ChecksumConfig::from_file(&config_file).unwrap());
    assert_eq!(cache.backing_file(), Some(cache_file.clone()));

    let files = write_files(dir.path(), 1);
    assert!(cache.schedule_digest(&files[0]).wait().is_ready());
    cache.save_cache().unwrap();
    assert!(cache_file.exists());
}

#[test]
fn concurrent_handles_settle_with_one_hash_per_file() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let files = write_files(dir.path(), 6);
    let cache = ChecksumCache::new(config());

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let cache = cache.clone();
            let files = files.clone();
            thread::spawn(move || {
                files
                    .iter()
                    .map(|path| cache.schedule_digest(path))
                    .map(|pending| pending.wait())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let results: Vec<Vec<DigestStatus>> =
        workers.into_iter().map(|w| w.join().unwrap()).collect();
    for statuses in &results {
        assert_eq!(statuses, &results[0]);
        assert!(statuses.iter().all(DigestStatus::is_ready));
    }
    assert_eq!(cache.stats().computations, 6);
}

#[test]
fn find_file_by_digest_returns_first_known_copy() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let original = dir.path().join("original.bin");
    let copy = dir.path().join("copy.bin");
    fs::write(&original, "identical bytes").unwrap();
    fs::write(&copy, "identical bytes").unwrap();
    let cache = ChecksumCache::new(config());

    let digest = cache.digest_of_file_blocking(&original).into_digest().unwrap();
    cache.digest_of_file_blocking(&copy);

    assert_eq!(
        cache.find_file_by_digest(&digest),
        Some(std::path::absolute(&original).unwrap())
    );
    assert_eq!(cache.find_file_by_digest(&FileHasher::compute_str("absent")), None);
}
