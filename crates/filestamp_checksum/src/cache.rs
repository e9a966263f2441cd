//! Checksum cache for file-level digests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::chain::{ComputeChain, DigestWorker, Job, PendingDigest};
use crate::persist;
use crate::{CacheRecord, ChecksumConfig, ChecksumError, DigestStatus, FileHasher, FileStat};

/// Maps absolute file paths to SHA-256 digests.
///
/// Digests are computed once and reused until the file's size or
/// modification time changes. Cloning yields another handle to the same
/// cache.
///
/// Three independent lock domains keep disk I/O away from the in-memory map:
/// the record map, the persistence state, and the computation chain that
/// runs at most one background hash at a time.
#[derive(Clone)]
pub struct ChecksumCache {
    inner: Arc<Inner>,
}

/// Counters describing a cache's contents and work done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Records currently held, pending ones included.
    pub records: usize,
    /// Records whose digest is still being computed.
    pub pending: usize,
    /// Read+hash passes performed.
    pub computations: u64,
    /// Read+hash passes that failed.
    pub failures: u64,
}

struct Inner {
    records: Mutex<RecordMap>,
    store: Mutex<StoreState>,
    chain: ComputeChain,
    config: ChecksumConfig,
    computations: AtomicU64,
    failures: AtomicU64,
}

/// Record map keyed by path, remembering first-insertion order.
#[derive(Default)]
struct RecordMap {
    slots: HashMap<PathBuf, Slot>,
    next_seq: u64,
}

struct Slot {
    seq: u64,
    record: Arc<CacheRecord>,
}

#[derive(Default)]
struct StoreState {
    cache_file: Option<PathBuf>,
    last_seen: Option<FileStat>,
}

enum Claim {
    Fresh(String),
    InFlight,
    Compute,
}

impl RecordMap {
    fn get(&self, path: &Path) -> Option<Arc<CacheRecord>> {
        self.slots.get(path).map(|slot| Arc::clone(&slot.record))
    }

    fn upsert(&mut self, record: CacheRecord) {
        let record = Arc::new(record);
        match self.slots.get_mut(&record.path) {
            Some(slot) => slot.record = record,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.slots.insert(record.path.clone(), Slot { seq, record });
            }
        }
    }

    fn remove(&mut self, path: &Path) -> bool {
        self.slots.remove(path).is_some()
    }

    /// Records in first-insertion order.
    fn ordered(&self) -> Vec<Arc<CacheRecord>> {
        let mut slots: Vec<&Slot> = self.slots.values().collect();
        slots.sort_by_key(|slot| slot.seq);
        slots.into_iter().map(|slot| Arc::clone(&slot.record)).collect()
    }
}

impl ChecksumCache {
    /// Creates a cache, loading `config.cache_file` when set.
    pub fn new(config: ChecksumConfig) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| Inner {
            records: Mutex::new(RecordMap::default()),
            store: Mutex::new(StoreState::default()),
            chain: ComputeChain::spawn(&config.worker_thread_name, weak.clone()),
            config: config.clone(),
            computations: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        });
        let cache = Self { inner };

        if let Some(cache_file) = &config.cache_file {
            cache.load_cache(cache_file);
        }

        cache
    }

    /// Computes the digest of a string. Never cached.
    pub fn digest_of_string(&self, data: &str) -> String {
        FileHasher::compute_str(data)
    }

    /// Returns the cached digest if fresh, otherwise schedules a background
    /// computation and returns [`DigestStatus::Pending`].
    pub fn digest_of_file(&self, path: &Path) -> DigestStatus {
        let path = absolute(path);
        let current = match FileStat::of(&path) {
            Ok(stat) => stat,
            Err(e) => return DigestStatus::failed(format!("{}: {}", path.display(), e)),
        };

        match self.inner.claim(&path, current) {
            Claim::Fresh(digest) => DigestStatus::Ready(digest),
            Claim::InFlight => DigestStatus::Pending,
            Claim::Compute => {
                debug!("Scheduling checksum of {}", path.display());
                match self.inner.chain.submit(Job::Compute { path, reply: None }) {
                    Ok(()) => DigestStatus::Pending,
                    Err(job) => self.inner.run_inline(job),
                }
            }
        }
    }

    /// Like [`ChecksumCache::digest_of_file`], but computes on the calling
    /// thread when no fresh digest is cached.
    pub fn digest_of_file_blocking(&self, path: &Path) -> DigestStatus {
        let path = absolute(path);
        let current = match FileStat::of(&path) {
            Ok(stat) => stat,
            Err(e) => return DigestStatus::failed(format!("{}: {}", path.display(), e)),
        };

        match self.inner.claim(&path, current) {
            Claim::Fresh(digest) => DigestStatus::Ready(digest),
            Claim::InFlight | Claim::Compute => self.inner.compute_and_store(&path),
        }
    }

    /// Schedules a digest and returns a handle that settles once it is known.
    ///
    /// A request for a file already being computed waits for that
    /// computation instead of hashing again.
    pub fn schedule_digest(&self, path: &Path) -> PendingDigest {
        let path = absolute(path);
        let current = match FileStat::of(&path) {
            Ok(stat) => stat,
            Err(e) => {
                return PendingDigest::ready(DigestStatus::failed(format!(
                    "{}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let (reply, pending) = PendingDigest::channel();
        let job = match self.inner.claim(&path, current) {
            Claim::Fresh(digest) => return PendingDigest::ready(DigestStatus::Ready(digest)),
            Claim::InFlight => Job::Notify { path, reply },
            Claim::Compute => Job::Compute {
                path,
                reply: Some(reply),
            },
        };

        match self.inner.chain.submit(job) {
            Ok(()) => pending,
            Err(job) => PendingDigest::ready(self.inner.run_inline(job)),
        }
    }

    /// Returns the digest only if a fresh one is cached. Never computes.
    pub fn cached_digest_if_fresh(&self, path: &Path) -> Option<String> {
        let path = absolute(path);
        let current = FileStat::of(&path).ok()?;
        let record = self.inner.records.lock().get(&path)?;
        (record.matches(&current) && !record.is_pending()).then(|| record.digest.clone())
    }

    /// Finds a file whose fresh cached digest equals `digest`.
    ///
    /// When several files share the digest, the one cached first wins.
    pub fn find_file_by_digest(&self, digest: &str) -> Option<PathBuf> {
        if FileHasher::is_failure(digest) {
            return None;
        }

        let candidates: Vec<Arc<CacheRecord>> = self
            .inner
            .records
            .lock()
            .ordered()
            .into_iter()
            .filter(|record| record.digest == digest)
            .collect();

        candidates
            .into_iter()
            .find(|record| !record.is_expired())
            .map(|record| record.path.clone())
    }

    /// Loads persisted records from `path` and remembers it as the backing
    /// file for [`ChecksumCache::save_cache`].
    ///
    /// A missing or unparsable file merges nothing. Returns the number of
    /// records merged.
    pub fn load_cache(&self, path: &Path) -> usize {
        let mut store = self.inner.store.lock();
        store.cache_file = Some(path.to_path_buf());
        store.last_seen = None;

        if !path.exists() {
            debug!("No checksum cache found at {}", path.display());
            return 0;
        }

        let stat = FileStat::of(path).ok();
        let records = match persist::read_records(path) {
            Ok(records) => records,
            Err(e) => {
                warn!("Ignoring checksum cache {}: {}", path.display(), e);
                return 0;
            }
        };
        store.last_seen = stat;

        let merged = self.inner.merge(records);
        info!("Loaded {} checksum records from {}", merged, path.display());
        merged
    }

    /// Writes every computed digest to the backing file.
    ///
    /// Changes written by other processes since the last read are merged in
    /// first. Does nothing when no backing file was loaded. Returns the
    /// number of records written.
    pub fn save_cache(&self) -> Result<usize, ChecksumError> {
        let mut store = self.inner.store.lock();
        let Some(cache_file) = store.cache_file.clone() else {
            return Ok(0);
        };

        self.inner.reload_locked(&mut store);

        let snapshot: Vec<CacheRecord> = self
            .inner
            .records
            .lock()
            .ordered()
            .into_iter()
            .filter(|record| !record.is_pending())
            .map(|record| (*record).clone())
            .collect();

        persist::write_records(&cache_file, &snapshot)?;
        store.last_seen = FileStat::of(&cache_file).ok();

        info!(
            "Saved {} checksum records to {}",
            snapshot.len(),
            cache_file.display()
        );
        Ok(snapshot.len())
    }

    /// Merges the backing file if another writer changed it since it was
    /// last read. Returns true if anything was read.
    pub fn reload_if_changed(&self) -> bool {
        let mut store = self.inner.store.lock();
        self.inner.reload_locked(&mut store)
    }

    /// Returns the backing cache file, if one was loaded.
    pub fn backing_file(&self) -> Option<PathBuf> {
        self.inner.store.lock().cache_file.clone()
    }

    /// Returns the number of records, pending ones included.
    pub fn len(&self) -> usize {
        self.inner.records.lock().slots.len()
    }

    /// Returns true if the cache holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops the record for `path`.
    pub fn remove(&self, path: &Path) -> bool {
        self.inner.records.lock().remove(&absolute(path))
    }

    /// Drops every record. The backing file is left untouched.
    pub fn clear(&self) {
        self.inner.records.lock().slots.clear();
    }

    /// Returns record counts and computation counters.
    pub fn stats(&self) -> CacheStats {
        let records = self.inner.records.lock();
        CacheStats {
            records: records.slots.len(),
            pending: records
                .slots
                .values()
                .filter(|slot| slot.record.is_pending())
                .count(),
            computations: self.inner.computations.load(Ordering::Relaxed),
            failures: self.inner.failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for ChecksumCache {
    fn default() -> Self {
        Self::new(ChecksumConfig::default())
    }
}

impl std::fmt::Debug for ChecksumCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChecksumCache")
            .field("stats", &self.stats())
            .field("backing_file", &self.backing_file())
            .finish()
    }
}

impl Inner {
    /// Decides whether `path` needs a computation, inserting or resetting
    /// its record when it does.
    fn claim(&self, path: &Path, current: FileStat) -> Claim {
        let known = self.records.lock().get(path).is_some();
        if !known {
            // Another process may already have written this digest.
            let mut store = self.store.lock();
            self.reload_locked(&mut store);
        }

        let mut records = self.records.lock();
        match records.get(path) {
            None => {
                debug!("Checksum cache miss for {}", path.display());
                records.upsert(CacheRecord::pending(path, current));
                Claim::Compute
            }
            Some(record) if record.is_pending() => Claim::InFlight,
            Some(record) if record.matches(&current) => {
                debug!("Checksum cache hit for {}", path.display());
                Claim::Fresh(record.digest.clone())
            }
            Some(_) => {
                debug!("Checksum of {} expired", path.display());
                records.upsert(CacheRecord::pending(path, current));
                Claim::Compute
            }
        }
    }

    fn run_inline(&self, job: Job) -> DigestStatus {
        match job {
            Job::Compute { path, .. } => self.compute_and_store(&path),
            Job::Notify { path, .. } => self.settled_status(&path),
        }
    }

    /// Must be called with the store lock held; takes the record lock only
    /// briefly and never while reading the file.
    fn reload_locked(&self, store: &mut StoreState) -> bool {
        let Some(cache_file) = store.cache_file.clone() else {
            return false;
        };

        if !cache_file.exists() {
            if store.last_seen.is_none() {
                return false;
            }
            // The file may be mid-replace by another process.
            thread::sleep(self.config.reload_retry_delay());
            if !cache_file.exists() {
                debug!("Checksum cache {} is gone", cache_file.display());
                store.last_seen = None;
                return false;
            }
        }

        let Ok(stat) = FileStat::of(&cache_file) else {
            return false;
        };
        if store.last_seen == Some(stat) {
            return false;
        }

        let records = match persist::read_records(&cache_file) {
            Ok(records) => records,
            Err(e) => {
                warn!("Ignoring checksum cache {}: {}", cache_file.display(), e);
                return false;
            }
        };
        store.last_seen = Some(stat);

        let merged = self.merge(records);
        debug!(
            "Reloaded {} checksum records from {}",
            merged,
            cache_file.display()
        );
        true
    }

    /// Upserts parsed records. A record is taken when none is held for its
    /// path and it still matches the file, or when it is newer than the one
    /// held.
    fn merge(&self, parsed: Vec<CacheRecord>) -> usize {
        let candidates: Vec<(CacheRecord, bool)> = parsed
            .into_iter()
            .filter(|record| !record.is_pending())
            .map(|record| {
                let expired = record.is_expired();
                (record, expired)
            })
            .collect();

        let mut records = self.records.lock();
        let mut merged = 0;
        for (record, expired) in candidates {
            let take = match records.get(&record.path) {
                None => !expired,
                Some(held) => held.modified < record.modified,
            };
            if take {
                records.upsert(record);
                merged += 1;
            }
        }
        merged
    }
}

impl DigestWorker for Inner {
    fn compute_and_store(&self, path: &Path) -> DigestStatus {
        // An inline computation may have settled this record while the job
        // was queued.
        let settled = self.records.lock().get(path).filter(|r| !r.is_pending());
        if let Some(record) = settled
            && let Ok(current) = FileStat::of(path)
            && record.matches(&current)
        {
            return DigestStatus::Ready(record.digest.clone());
        }

        // Stat before hashing: if the file changes mid-hash, the stored stat
        // is already stale and the next request recomputes.
        self.computations.fetch_add(1, Ordering::Relaxed);
        let result = FileStat::of(path)
            .and_then(|stat| FileHasher::compute_file(path).map(|digest| (digest, stat)));

        match result {
            Ok((digest, stat)) => {
                self.records
                    .lock()
                    .upsert(CacheRecord::with_digest(path, digest.clone(), stat));
                DigestStatus::Ready(digest)
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                self.records.lock().remove(path);
                warn!("Failed to compute checksum of {}: {}", path.display(), e);
                DigestStatus::failed(e)
            }
        }
    }

    fn settled_status(&self, path: &Path) -> DigestStatus {
        let record = self.records.lock().get(path);
        match record {
            Some(record) if !record.is_pending() => DigestStatus::Ready(record.digest.clone()),
            // Still pending behind an inline computation on another thread.
            Some(_) => self.compute_and_store(path),
            None => DigestStatus::failed(format!(
                "checksum of {} could not be computed",
                path.display()
            )),
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
