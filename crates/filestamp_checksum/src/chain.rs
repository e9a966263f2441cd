//! Serialized background digest computation.
//!
//! All background digests run on one worker thread fed by a FIFO channel, so
//! at most one read+hash is in flight no matter how many files are requested.

use std::path::{Path, PathBuf};
use std::sync::Weak;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::{debug, error};

use crate::DigestStatus;

/// Work the chain knows how to run.
pub(crate) trait DigestWorker: Send + Sync + 'static {
    /// Hashes the file and stores the result.
    fn compute_and_store(&self, path: &Path) -> DigestStatus;

    /// Reports the outcome of an earlier computation for `path`.
    fn settled_status(&self, path: &Path) -> DigestStatus;
}

pub(crate) enum Job {
    /// Hash a file, optionally reporting the result.
    Compute {
        path: PathBuf,
        reply: Option<Sender<DigestStatus>>,
    },
    /// Report once everything queued ahead of this job has finished.
    Notify {
        path: PathBuf,
        reply: Sender<DigestStatus>,
    },
}

pub(crate) struct ComputeChain {
    tx: Option<Sender<Job>>,
}

impl ComputeChain {
    /// Starts the worker thread.
    ///
    /// The worker holds only a weak reference and stops once the owner is
    /// dropped. If the thread cannot be spawned, every submission is rejected
    /// and callers fall back to computing inline.
    pub(crate) fn spawn<W: DigestWorker>(name: &str, worker: Weak<W>) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded::<Job>();
        let spawned = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(worker, rx));

        match spawned {
            Ok(_) => Self { tx: Some(tx) },
            Err(e) => {
                error!("Failed to start checksum worker thread: {}", e);
                Self { tx: None }
            }
        }
    }

    /// Appends a job to the chain, handing it back if no worker is running.
    pub(crate) fn submit(&self, job: Job) -> Result<(), Job> {
        match &self.tx {
            Some(tx) => tx.send(job).map_err(|e| e.into_inner()),
            None => Err(job),
        }
    }
}

fn run<W: DigestWorker>(worker: Weak<W>, rx: Receiver<Job>) {
    for job in rx {
        let Some(worker) = worker.upgrade() else {
            break;
        };

        match job {
            Job::Compute { path, reply } => {
                let status = worker.compute_and_store(&path);
                debug!("{} checksum is {}", path.display(), status);
                if let Some(reply) = reply {
                    let _ = reply.send(status);
                }
            }
            Job::Notify { path, reply } => {
                let _ = reply.send(worker.settled_status(&path));
            }
        }
    }
    debug!("Checksum worker stopped");
}

/// Completion handle for a scheduled digest.
///
/// Dropping the handle does not cancel the computation; its result is still
/// stored in the cache.
#[derive(Debug)]
pub struct PendingDigest {
    rx: Receiver<DigestStatus>,
}

impl PendingDigest {
    pub(crate) fn channel() -> (Sender<DigestStatus>, Self) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        (tx, Self { rx })
    }

    pub(crate) fn ready(status: DigestStatus) -> Self {
        let (tx, pending) = Self::channel();
        let _ = tx.send(status);
        pending
    }

    /// Blocks until the digest is settled.
    pub fn wait(self) -> DigestStatus {
        self.rx.recv().unwrap_or_else(|_| worker_stopped())
    }

    /// Blocks up to `timeout`, handing the handle back if still pending.
    pub fn wait_timeout(self, timeout: Duration) -> Result<DigestStatus, Self> {
        match self.rx.recv_timeout(timeout) {
            Ok(status) => Ok(status),
            Err(RecvTimeoutError::Timeout) => Err(self),
            Err(RecvTimeoutError::Disconnected) => Ok(worker_stopped()),
        }
    }

    /// Returns the digest if already settled.
    pub fn try_get(self) -> Result<DigestStatus, Self> {
        match self.rx.try_recv() {
            Ok(status) => Ok(status),
            Err(TryRecvError::Empty) => Err(self),
            Err(TryRecvError::Disconnected) => Ok(worker_stopped()),
        }
    }
}

fn worker_stopped() -> DigestStatus {
    DigestStatus::failed("checksum worker stopped before the digest was computed")
}
