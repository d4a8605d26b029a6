//! Index-assisted incremental scanning.
//!
//! # Overview
//!
//! [`IncrementalScanner`] combines a validated snapshot from the
//! [`IndexStore`] with a fresh walk of the tree. Directories whose own mtime
//! (and their parent's, inside the root) is not newer than the snapshot are
//! pruned, so an unchanged library is answered almost entirely from the
//! index. Files already known from the snapshot are not stat-ed twice.
//!
//! When the walk turns up files the snapshot did not know about, a fully
//! refreshed snapshot is written back. An unlimited walk stamps it with the
//! time the scan started. A depth-limited walk only rewrites a snapshot it
//! loaded and keeps that snapshot's time, since it never looked below the
//! limit.
//!
//! Pruning trusts directory mtimes. A file added two levels below an
//! unchanged directory is therefore only picked up once the snapshot
//! expires.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;

use super::metadata::FileMetadataCache;
use super::path_utils::{path_key, PathNormalizer};
use super::walker::Walker;
use super::{FileRecord, ScanError, WalkerConfig};
use crate::index::IndexStore;

/// Counters describing how a scan was answered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    /// Files answered from the index
    pub cached_files: usize,
    /// Audio files discovered by the walk
    pub new_files: usize,
    /// Index entries dropped because they no longer matched the disk
    pub stale_entries: usize,
    /// Directories whose subtree was skipped
    pub pruned_dirs: usize,
    /// Whether a valid snapshot was loaded
    pub index_used: bool,
    /// Whether a refreshed snapshot was written
    pub index_persisted: bool,
}

/// Result of a scan.
#[derive(Debug, Clone)]
pub struct ScanOutput {
    /// Normalized absolute root
    pub root: PathBuf,
    /// Matching records, sorted by path
    pub records: Vec<FileRecord>,
    /// How the scan was answered
    pub stats: ScanStats,
}

/// Scanner that reuses the persisted index between runs.
#[derive(Debug)]
pub struct IncrementalScanner {
    normalizer: Arc<PathNormalizer>,
    metadata: Arc<FileMetadataCache>,
    index: Option<IndexStore>,
    follow_symlinks: bool,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl IncrementalScanner {
    /// Create a scanner without an index (every scan walks the full tree).
    #[must_use]
    pub fn new(normalizer: Arc<PathNormalizer>, metadata: Arc<FileMetadataCache>) -> Self {
        Self {
            normalizer,
            metadata,
            index: None,
            follow_symlinks: false,
            shutdown_flag: None,
        }
    }

    /// Use `store` to load and persist snapshots.
    #[must_use]
    pub fn with_index(mut self, store: IndexStore) -> Self {
        self.index = Some(store);
        self
    }

    /// Follow symbolic links while walking.
    #[must_use]
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Set the shutdown flag checked between directory visits.
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

    /// Normalize `root` and make sure it is a readable directory.
    fn resolve_root(&self, root: &Path) -> Result<PathBuf, ScanError> {
        let absolute = std::path::absolute(root).map_err(|e| ScanError::from_io(root, e))?;
        let root = self.normalizer.normalize(&absolute);

        let meta = fs::metadata(&root).map_err(|e| ScanError::from_io(&root, e))?;
        if !meta.is_dir() {
            return Err(ScanError::NotADirectory(root));
        }
        fs::read_dir(&root).map_err(|e| ScanError::from_io(&root, e))?;
        Ok(root)
    }

    /// Scan `root` for audio files.
    ///
    /// # Arguments
    ///
    /// * `root` - Directory to scan
    /// * `max_depth` - Deepest containing directory, relative to the root
    ///   (files directly in the root are depth 0; 0 means unlimited)
    /// * `min_size` - Smallest file size in bytes to report
    ///
    /// # Errors
    ///
    /// Fails when the root is missing, not a directory or unreadable, and
    /// with [`ScanError::Interrupted`] when shutdown is requested. Errors
    /// on individual entries are logged and skipped.
    pub fn scan(
        &self,
        root: &Path,
        max_depth: usize,
        min_size: u64,
    ) -> Result<ScanOutput, ScanError> {
        let root = self.resolve_root(root)?;
        let mut stats = ScanStats::default();
        let started = SystemTime::now();

        let loaded = self
            .index
            .as_ref()
            .and_then(|store| store.load(&root, &self.metadata));

        let (cached, index_time) = match loaded {
            Some(index) => {
                stats.index_used = true;
                stats.stale_entries = index.dropped;
                (index.records, Some(index.timestamp))
            }
            None => (Vec::new(), None),
        };
        stats.cached_files = cached.len();
        log::debug!(
            "Scanning {} ({} files from index)",
            root.display(),
            cached.len()
        );

        let known: HashSet<String> = cached.iter().map(|r| path_key(&r.path)).collect();
        let mut dir_mtimes: HashMap<PathBuf, Option<SystemTime>> = HashMap::new();
        let mut pruned_dirs = 0usize;
        let mut discovered: Vec<FileRecord> = Vec::new();

        let mut walker = Walker::new(&root, WalkerConfig::new(self.follow_symlinks, max_depth));
        if let Some(flag) = &self.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }

        let should_scan_dir = |dir: &Path| -> bool {
            let Some(since) = index_time else {
                return true;
            };
            let mut newer = |d: &Path| {
                dir_mtimes
                    .entry(d.to_path_buf())
                    .or_insert_with(|| fs::metadata(d).and_then(|m| m.modified()).ok())
                    .is_some_and(|mtime| mtime > since)
            };
            let changed = newer(dir)
                || (dir != root.as_path() && dir.parent().is_some_and(|parent| newer(parent)));
            if !changed {
                pruned_dirs += 1;
            }
            changed
        };

        for entry in walker.walk_pruned(should_scan_dir) {
            let path = match entry {
                Ok(path) => path,
                Err(ScanError::Interrupted) => return Err(ScanError::Interrupted),
                Err(e) => {
                    log::debug!("Skipping entry: {}", e);
                    continue;
                }
            };

            if known.contains(&path_key(&path)) {
                continue;
            }

            let record = self.metadata.stat(&path);
            if record.exists {
                discovered.push(record);
            }
        }

        if self.is_shutdown_requested() {
            return Err(ScanError::Interrupted);
        }

        stats.pruned_dirs = pruned_dirs;
        stats.new_files = discovered.len();

        let mut merged = cached;
        merged.extend(discovered);

        // A depth-limited walk only extends an existing snapshot and keeps its
        // time, so directories below the limit are still walked next time.
        let stamp = if max_depth == 0 { Some(started) } else { index_time };
        if let (Some(store), Some(stamp)) = (self.index.as_ref(), stamp) {
            if stats.new_files > 0 {
                let refreshed: Vec<FileRecord> =
                    merged.iter().map(|r| self.metadata.stat(&r.path)).collect();
                stats.index_persisted = store.save_at(&root, &refreshed, stamp);
            }
        }

        let mut records: Vec<FileRecord> = merged
            .into_iter()
            .filter(|r| r.size >= min_size)
            .filter(|r| max_depth == 0 || depth_below(&root, &r.path) <= max_depth)
            .collect();
        records.sort_by(|a, b| a.path.cmp(&b.path));

        log::info!(
            "Found {} audio files ({} from index, {} new, {} directories skipped)",
            records.len(),
            stats.cached_files,
            stats.new_files,
            stats.pruned_dirs
        );

        Ok(ScanOutput {
            root,
            records,
            stats,
        })
    }
}

/// Depth of the directory containing `path`, relative to `root`.
fn depth_below(root: &Path, path: &Path) -> usize {
    path.strip_prefix(root)
        .map(|rel| rel.components().count().saturating_sub(1))
        .unwrap_or(0)
}
