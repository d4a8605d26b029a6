//! Directory index persistence.
//!
//! # Overview
//!
//! [`IndexStore`] keeps one JSON snapshot per scan root in an index
//! directory. The file name is the hex SHA-256 of the normalized root, so
//! the same root always maps to the same file:
//!
//! ```text
//! <index_dir>/<sha256(root)>.json
//! ```
//!
//! Writes go to a temporary file in the same directory which is then
//! renamed over the target, so readers never observe a half-written
//! snapshot. Writes for the same target are serialized by a per-path lock
//! owned by the store; clones of a store share the lock table.
//!
//! Unparsable snapshots are renamed aside (`<key>.json.corrupt-<UTC>`)
//! rather than deleted and treated as a miss.
//!
//! # Example
//!
//! ```no_run
//! use audiodupe::index::IndexStore;
//! use audiodupe::scanner::FileMetadataCache;
//! use std::path::Path;
//!
//! let store = IndexStore::default_location().unwrap();
//! let metadata = FileMetadataCache::new();
//! if let Some(index) = store.load(Path::new("/music"), &metadata) {
//!     println!("{} cached files", index.records.len());
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use directories::ProjectDirs;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::entry::{IndexDocument, IndexEntry};
use crate::scanner::{secs_to_system_time, system_time_to_secs, FileMetadataCache, FileRecord};

/// Snapshots older than this are ignored.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Largest mtime drift (in seconds) still considered unchanged.
pub const MTIME_TOLERANCE_SECS: f64 = 1.0;

/// How far in the future a snapshot time may lie before it counts as corrupt.
const CLOCK_SKEW: Duration = Duration::from_secs(60);

/// Errors that can occur while persisting an index.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Filesystem access failed.
    #[error("Index I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The snapshot could not be serialized.
    #[error("Index serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The temporary file could not be renamed into place.
    #[error("Failed to move index into place: {0}")]
    Persist(#[from] tempfile::PersistError),

    /// No platform cache directory could be determined.
    #[error("Could not determine the platform cache directory")]
    NoProjectDirs,
}

/// A validated snapshot returned by [`IndexStore::load`].
#[derive(Debug, Clone)]
pub struct LoadedIndex {
    /// Records that passed validation, carrying their live stat
    pub records: Vec<FileRecord>,
    /// When the snapshot was written
    pub timestamp: SystemTime,
    /// Number of stale entries dropped during validation
    pub dropped: usize,
}

type LockTable = Arc<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>>;

/// Reads and writes directory snapshots.
#[derive(Debug, Clone)]
pub struct IndexStore {
    index_dir: PathBuf,
    max_age: Duration,
    locks: LockTable,
}

impl IndexStore {
    /// Create a store keeping its snapshots in `index_dir`.
    ///
    /// The directory is created on first write.
    #[must_use]
    pub fn new(index_dir: impl Into<PathBuf>) -> Self {
        Self {
            index_dir: index_dir.into(),
            max_age: DEFAULT_MAX_AGE,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create a store in the platform cache directory.
    ///
    /// - Linux: `~/.cache/audiodupe/index`
    /// - macOS: `~/Library/Caches/audiodupe/index`
    /// - Windows: `%LOCALAPPDATA%\audiodupe\cache\index`
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NoProjectDirs`] when no home directory is known.
    pub fn default_location() -> Result<Self, IndexError> {
        Self::default_dir().map(Self::new)
    }

    /// The platform default index directory.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NoProjectDirs`] when no home directory is known.
    pub fn default_dir() -> Result<PathBuf, IndexError> {
        ProjectDirs::from("", "", "audiodupe")
            .map(|dirs| dirs.cache_dir().join("index"))
            .ok_or(IndexError::NoProjectDirs)
    }

    /// Set the maximum snapshot age.
    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Directory holding the snapshots.
    #[must_use]
    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    /// Deterministic key for a normalized root.
    #[must_use]
    pub fn index_key(root: &Path) -> String {
        let mut hasher = Sha256::new();
        hasher.update(root.to_string_lossy().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Location of the snapshot for a normalized root.
    #[must_use]
    pub fn index_path(&self, root: &Path) -> PathBuf {
        self.index_dir
            .join(format!("{}.json", Self::index_key(root)))
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut table = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(table.entry(path.to_path_buf()).or_default())
    }

    /// Persist a snapshot of `records` for `root`, stamped with the current
    /// time.
    ///
    /// Records whose path no longer exists are left out. If nothing is left,
    /// the snapshot is removed instead. Failures are logged, never returned;
    /// the return value tells whether a snapshot is now on disk.
    pub fn save(&self, root: &Path, records: &[FileRecord]) -> bool {
        self.save_at(root, records, SystemTime::now())
    }

    /// Like [`save`](Self::save), but stamped with `taken`.
    ///
    /// A snapshot's time promises that every directory not modified since
    /// then is fully described by it. Callers that only extend an existing
    /// snapshot must pass that snapshot's time, not the current one.
    pub fn save_at(&self, root: &Path, records: &[FileRecord], taken: SystemTime) -> bool {
        self.write_snapshot(root, records, system_time_to_secs(taken))
    }

    fn write_snapshot(&self, root: &Path, records: &[FileRecord], timestamp: f64) -> bool {
        let path = self.index_path(root);
        let lock = self.lock_for(&path);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let files: Vec<IndexEntry> = records
            .iter()
            .filter(|r| r.path.exists())
            .map(IndexEntry::from)
            .collect();

        if files.is_empty() {
            log::debug!("No surviving files for {}, removing index", root.display());
            if let Err(e) = remove_if_present(&path) {
                log::warn!("Failed to remove index {}: {}", path.display(), e);
            }
            return false;
        }

        let doc = IndexDocument {
            root_dir: root.to_string_lossy().into_owned(),
            timestamp,
            files,
        };

        match self.write_atomic(&path, &doc) {
            Ok(()) => {
                log::debug!(
                    "Saved index with {} files to {}",
                    doc.files.len(),
                    path.display()
                );
                true
            }
            Err(e) => {
                log::warn!("Failed to save index {}: {}", path.display(), e);
                false
            }
        }
    }

    fn write_atomic(&self, path: &Path, doc: &IndexDocument) -> Result<(), IndexError> {
        fs::create_dir_all(&self.index_dir)?;

        let prefix = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut tmp = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".json.tmp")
            .tempfile_in(&self.index_dir)?;

        {
            let mut writer = BufWriter::new(&mut tmp);
            serde_json::to_writer_pretty(&mut writer, doc)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path)?;
        Ok(())
    }

    /// Load and validate the snapshot for `root`.
    ///
    /// Returns `None` when the snapshot is absent, unparsable, written for
    /// another root, older than the maximum age, or when no entry survives
    /// validation. A snapshot whose time is negative, unrepresentable or in
    /// the future is quarantined like an unparsable one. Entries are checked
    /// against a fresh stat taken through `metadata`; if any are dropped, a
    /// compacted snapshot keeping the original time is saved.
    pub fn load(&self, root: &Path, metadata: &FileMetadataCache) -> Option<LoadedIndex> {
        let path = self.index_path(root);

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("No index for {}", root.display());
                return None;
            }
            Err(e) => {
                log::warn!("Failed to read index {}: {}", path.display(), e);
                return None;
            }
        };

        let doc: IndexDocument = match serde_json::from_str(&content) {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!("Corrupt index {}: {}", path.display(), e);
                self.quarantine(&path);
                return None;
            }
        };

        if Path::new(&doc.root_dir) != root {
            log::debug!(
                "Index {} belongs to {}, not {}",
                path.display(),
                doc.root_dir,
                root.display()
            );
            return None;
        }

        let now = SystemTime::now();
        let Some(timestamp) = secs_to_system_time(doc.timestamp)
            .filter(|t| doc.timestamp >= 0.0 && *t <= now + CLOCK_SKEW)
        else {
            log::warn!(
                "Corrupt index {}: invalid timestamp {}",
                path.display(),
                doc.timestamp
            );
            self.quarantine(&path);
            return None;
        };

        let age = now.duration_since(timestamp).unwrap_or_default();
        if age > self.max_age {
            log::debug!("Index for {} expired ({}s old)", root.display(), age.as_secs());
            return None;
        }

        let total = doc.files.len();
        let records: Vec<FileRecord> = doc
            .files
            .iter()
            .filter_map(|entry| validate_entry(entry, metadata))
            .collect();
        let dropped = total - records.len();

        if dropped > 0 {
            log::info!(
                "Dropped {} stale index entries for {}",
                dropped,
                root.display()
            );
            // Dropping entries says nothing about unseen directories, so the
            // original time stays.
            self.write_snapshot(root, &records, doc.timestamp);
        }

        if records.is_empty() {
            return None;
        }

        Some(LoadedIndex {
            records,
            timestamp,
            dropped,
        })
    }

    /// Delete the snapshot for `root`.
    ///
    /// Returns whether a snapshot existed.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Io`] if the file exists but cannot be removed.
    pub fn remove(&self, root: &Path) -> Result<bool, IndexError> {
        let path = self.index_path(root);
        let lock = self.lock_for(&path);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        remove_if_present(&path)
    }

    /// Move a corrupt snapshot out of the way, keeping it for inspection.
    fn quarantine(&self, path: &Path) {
        let lock = self.lock_for(path);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        let mut target = path.as_os_str().to_owned();
        target.push(format!(".corrupt-{stamp}"));
        let target = PathBuf::from(target);

        match fs::rename(path, &target) {
            Ok(()) => log::warn!("Moved corrupt index to {}", target.display()),
            Err(e) => log::warn!("Failed to move corrupt index {}: {}", path.display(), e),
        }
    }
}

/// Re-stat an entry; keep it only if size matches exactly and the mtime
/// stayed within tolerance.
fn validate_entry(entry: &IndexEntry, metadata: &FileMetadataCache) -> Option<FileRecord> {
    let live = metadata.stat(Path::new(&entry.path));
    if !live.exists {
        log::trace!("Index entry gone: {}", entry.path);
        return None;
    }
    if live.size != entry.size {
        log::trace!("Index entry size changed: {}", entry.path);
        return None;
    }
    if (live.mtime_secs() - entry.mtime).abs() > MTIME_TOLERANCE_SECS {
        log::trace!("Index entry mtime changed: {}", entry.path);
        return None;
    }
    Some(live)
}

fn remove_if_present(path: &Path) -> Result<bool, IndexError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
