//! Duplicate classification strategies.
//!
//! # Overview
//!
//! [`Classifier::classify`] turns a flat list of records into
//! [`DuplicateGroup`]s according to a [`Method`]:
//!
//! | Method | Equal when | Key | Label |
//! |---|---|---|---|
//! | `Filename` | same parsed title and artist | `title\|artist` | `Song: <title> (<n> versions)` |
//! | `Size` | same byte size | size | `Size: <human size>` |
//! | `Hash` | same BLAKE3 digest | hex digest | `Hash: <8 hex>...` |
//! | `Mixed` | same size and digest | `size:digest` | `Size: <human size>, Hash: <8 hex>...` |
//!
//! Content hashing only happens for files that share their size with at
//! least one other file, since nothing else can have an equal digest. It
//! runs on a dedicated rayon pool limited to `io_threads` threads. Files
//! whose content could not be read never group with anything.
//!
//! Groups are returned ordered by key (numeric for sizes), members ordered
//! by path.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::filename::{parse_music_filename, song_key};
use super::groups::{format_size, group_by_size, partition_by, DuplicateGroup};
use crate::progress::ProgressCallback;
use crate::scanner::{hash_to_hex, ContentHash, FileMetadataCache, FileRecord, Hash};

/// Default number of threads used for hashing.
pub const DEFAULT_IO_THREADS: usize = 4;

/// Progress range covered by classification (scanning owns the part below).
const PROGRESS_START: u8 = 40;
const PROGRESS_END: u8 = 95;

/// How often (in files) hashing reports progress.
const PROGRESS_INTERVAL: usize = 25;

/// Duplicate classification method.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Same song according to file name heuristics
    #[default]
    Filename,
    /// Same byte size
    Size,
    /// Same content hash
    Hash,
    /// Same byte size, then same content hash
    Mixed,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Filename => "filename",
            Self::Size => "size",
            Self::Hash => "hash",
            Self::Mixed => "mixed",
        };
        f.write_str(name)
    }
}

/// Errors that abort a classification run.
#[derive(Error, Debug)]
pub enum ClassifyError {
    /// Shutdown was requested while classifying.
    #[error("Classification interrupted")]
    Interrupted,

    /// The hashing thread pool could not be created.
    #[error("Failed to create hashing thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A hashing worker or the progress callback panicked.
    #[error("Classification worker panicked: {0}")]
    Panicked(String),
}

/// Groups records under a [`Method`].
pub struct Classifier {
    metadata: Arc<FileMetadataCache>,
    io_threads: usize,
    progress: Option<Arc<dyn ProgressCallback>>,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("io_threads", &self.io_threads)
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .field("shutdown_flag", &self.shutdown_flag)
            .finish_non_exhaustive()
    }
}

impl Classifier {
    /// Create a classifier hashing through `metadata`.
    #[must_use]
    pub fn new(metadata: Arc<FileMetadataCache>) -> Self {
        Self {
            metadata,
            io_threads: DEFAULT_IO_THREADS,
            progress: None,
            shutdown_flag: None,
        }
    }

    /// Set the number of hashing threads (at least 1).
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Set the shutdown flag checked between hash computations.
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

    fn report(&self, message: &str, percent: u8) {
        if let Some(progress) = &self.progress {
            progress.on_progress(message, percent);
        }
    }

    /// Group `records` under `method`, discarding groups smaller than two.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError::Interrupted`] when shutdown is requested,
    /// [`ClassifyError::ThreadPool`] when the hashing pool cannot be built and
    /// [`ClassifyError::Panicked`] when a worker or the progress callback
    /// panics. Panics are only caught in builds that unwind.
    pub fn classify(
        &self,
        records: Vec<FileRecord>,
        method: Method,
    ) -> Result<Vec<DuplicateGroup>, ClassifyError> {
        if self.is_shutdown_requested() {
            return Err(ClassifyError::Interrupted);
        }

        panic::catch_unwind(AssertUnwindSafe(|| self.classify_inner(records, method)))
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                log::error!("Classification by {} panicked: {}", method, message);
                Err(ClassifyError::Panicked(message))
            })
    }

    fn classify_inner(
        &self,
        records: Vec<FileRecord>,
        method: Method,
    ) -> Result<Vec<DuplicateGroup>, ClassifyError> {
        log::info!("Classifying {} files by {}", records.len(), method);
        self.report(&format!("Comparing files by {method}"), PROGRESS_START);

        let groups = match method {
            Method::Filename => by_filename(records),
            Method::Size => by_size(records),
            Method::Hash => self.by_hash(records)?,
            Method::Mixed => self.by_size_and_hash(records)?,
        };

        log::info!("Found {} duplicate groups", groups.len());
        self.report(
            &format!("Found {} duplicate groups", groups.len()),
            PROGRESS_END,
        );
        Ok(groups)
    }

    fn by_hash(&self, records: Vec<FileRecord>) -> Result<Vec<DuplicateGroup>, ClassifyError> {
        let candidates = group_by_size(records).into_values().flatten().collect();
        let hashed = self.hash_all(candidates)?;

        Ok(partition_by(hashed, known_hash)
            .into_iter()
            .map(|(hash, files)| {
                let hex = hash_to_hex(&hash);
                let label = format!("Hash: {}...", &hex[..8]);
                DuplicateGroup::new(hex, label, files)
            })
            .collect())
    }

    fn by_size_and_hash(
        &self,
        records: Vec<FileRecord>,
    ) -> Result<Vec<DuplicateGroup>, ClassifyError> {
        let candidates = group_by_size(records).into_values().flatten().collect();
        let hashed = self.hash_all(candidates)?;

        Ok(
            partition_by(hashed, |r| known_hash(r).map(|hash| (r.size, hash)))
                .into_iter()
                .map(|((size, hash), files)| {
                    let hex = hash_to_hex(&hash);
                    let label = format!("Size: {}, Hash: {}...", format_size(size), &hex[..8]);
                    DuplicateGroup::new(format!("{size}:{hex}"), label, files)
                })
                .collect(),
        )
    }

    /// Compute content hashes on a bounded pool, attaching them to the
    /// records.
    fn hash_all(&self, records: Vec<FileRecord>) -> Result<Vec<FileRecord>, ClassifyError> {
        let total = records.len();
        if total == 0 {
            return Ok(records);
        }

        log::debug!("Hashing {} files on {} threads", total, self.io_threads);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.io_threads)
            .build()?;

        let done = AtomicUsize::new(0);
        let hashed: Vec<FileRecord> = pool.install(|| {
            records
                .into_par_iter()
                .map(|record| {
                    if self.is_shutdown_requested() {
                        return record;
                    }
                    let hash = self.metadata.hash(&record);

                    let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                    if finished % PROGRESS_INTERVAL == 0 || finished == total {
                        self.report(
                            &format!("Hashing files ({finished}/{total})"),
                            scale_progress(finished, total),
                        );
                    }
                    record.with_hash(hash)
                })
                .collect()
        });

        if self.is_shutdown_requested() {
            log::debug!("Hashing stopped by shutdown request");
            return Err(ClassifyError::Interrupted);
        }
        Ok(hashed)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn known_hash(record: &FileRecord) -> Option<Hash> {
    match record.hash {
        Some(ContentHash::Known(hash)) => Some(hash),
        Some(ContentHash::Unknown) | None => None,
    }
}

fn scale_progress(done: usize, total: usize) -> u8 {
    let span = usize::from(PROGRESS_END - PROGRESS_START);
    let offset = if total == 0 { span } else { done.min(total) * span / total };
    PROGRESS_START + u8::try_from(offset).unwrap_or(PROGRESS_END - PROGRESS_START)
}

fn by_size(records: Vec<FileRecord>) -> Vec<DuplicateGroup> {
    group_by_size(records)
        .into_iter()
        .map(|(size, files)| {
            DuplicateGroup::new(size.to_string(), format!("Size: {}", format_size(size)), files)
        })
        .collect()
}

fn by_filename(records: Vec<FileRecord>) -> Vec<DuplicateGroup> {
    partition_by(records, |r| {
        let (title, artist) = parse_music_filename(&r.file_name());
        Some((song_key(&title, &artist), title))
    })
    .into_iter()
    .map(|((key, title), files)| {
        let label = format!("Song: {} ({} versions)", title, files.len());
        DuplicateGroup::new(key, label, files)
    })
    .collect()
}
