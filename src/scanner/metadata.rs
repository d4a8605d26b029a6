//! Per-session memoization of stat snapshots and content hashes.
//!
//! # Overview
//!
//! [`FileMetadataCache`] is shared by the scanner and the classifier. It
//! answers two questions about a path:
//!
//! - What are its size and mtime right now? ([`FileMetadataCache::stat`])
//! - What is its content hash? ([`FileMetadataCache::hash`])
//!
//! Stat failures never raise; the record is marked non-existent instead.
//! Hashing retries transient read errors a bounded number of times before
//! giving up with [`ContentHash::Unknown`]. Both answers are memoized for
//! the lifetime of the cache. The internal locks are never held while a
//! file is being read.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use super::hasher::{Hash, Hasher};
use super::{ContentHash, FileRecord, HashError};

/// Default number of hashing attempts per file.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default backoff unit between attempts (multiplied by the attempt number).
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Thread-safe stat and hash memo.
#[derive(Debug)]
pub struct FileMetadataCache {
    records: Mutex<HashMap<PathBuf, FileRecord>>,
    // Keyed by path; an entry only answers for the same size and mtime.
    hashes: Mutex<HashMap<PathBuf, (u64, SystemTime, ContentHash)>>,
    hasher: Hasher,
    max_attempts: u32,
    retry_backoff: Duration,
    shutdown_flag: Option<Arc<AtomicBool>>,
    hashes_computed: AtomicUsize,
}

impl Default for FileMetadataCache {
    fn default() -> Self {
        Self::new()
    }
}

impl FileMetadataCache {
    /// Create an empty cache with default retry settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            hashes: Mutex::new(HashMap::new()),
            hasher: Hasher::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            shutdown_flag: None,
            hashes_computed: AtomicUsize::new(0),
        }
    }

    /// Set the number of hashing attempts (at least 1).
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the backoff unit between hashing attempts.
    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Set the shutdown flag checked before each hash.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Take a fresh snapshot of `path`, replacing any memoized one.
    ///
    /// Never fails: a path that cannot be stat-ed (missing, permission
    /// denied, not a regular file) yields a record with `exists == false`.
    pub fn stat(&self, path: &Path) -> FileRecord {
        let record = match fs::metadata(path) {
            Ok(meta) if meta.is_file() => FileRecord::new(
                path.to_path_buf(),
                meta.len(),
                meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            ),
            Ok(_) => {
                log::debug!("Not a regular file: {}", path.display());
                FileRecord::missing(path.to_path_buf())
            }
            Err(e) => {
                log::debug!("Cannot stat {}: {}", path.display(), e);
                FileRecord::missing(path.to_path_buf())
            }
        };

        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf(), record.clone());
        record
    }

    /// Memoized snapshot of `path`, stat-ing it on first use.
    pub fn record(&self, path: &Path) -> FileRecord {
        if let Some(record) = self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
        {
            return record.clone();
        }
        self.stat(path)
    }

    /// Content hash of the file behind `record`.
    ///
    /// Returns [`ContentHash::Unknown`] for non-existent records, for files
    /// that stay unreadable after all attempts, and when shutdown has been
    /// requested. Cancelled lookups are not memoized.
    pub fn hash(&self, record: &FileRecord) -> ContentHash {
        if let Some(hash) = self
            .hashes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&record.path)
            .filter(|(size, modified, _)| *size == record.size && *modified == record.modified)
            .map(|(_, _, hash)| *hash)
        {
            return hash;
        }

        if self.is_shutdown_requested() {
            return ContentHash::Unknown;
        }

        let hash = if record.exists {
            self.hashes_computed.fetch_add(1, Ordering::Relaxed);
            match retry_hash(self.max_attempts, self.retry_backoff, || {
                self.hasher.full_hash(&record.path)
            }) {
                Ok(digest) => ContentHash::Known(digest),
                Err(e) => {
                    log::warn!("Could not hash {}: {}", record.path.display(), e);
                    ContentHash::Unknown
                }
            }
        } else {
            ContentHash::Unknown
        };

        self.hashes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.path.clone(), (record.size, record.modified, hash));
        hash
    }

    /// Number of files actually read for hashing (memo hits excluded).
    pub fn hashes_computed(&self) -> usize {
        self.hashes_computed.load(Ordering::Relaxed)
    }
}

/// Run `attempt` up to `max_attempts` times, sleeping `backoff * n` after
/// the n-th transient failure.
fn retry_hash<F>(max_attempts: u32, backoff: Duration, mut attempt: F) -> Result<Hash, HashError>
where
    F: FnMut() -> Result<Hash, HashError>,
{
    let mut tries = 0;
    loop {
        tries += 1;
        match attempt() {
            Ok(hash) => return Ok(hash),
            Err(e) if e.is_transient() && tries < max_attempts => {
                log::debug!("Hash attempt {tries}/{max_attempts} failed: {e}");
                std::thread::sleep(backoff * tries);
            }
            Err(e) => return Err(e),
        }
    }
}
