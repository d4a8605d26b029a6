//! Search orchestration.
//!
//! # Overview
//!
//! [`DuplicateFinder`] runs one search end to end:
//! 1. **Scan** - Collect audio files under the root, reusing the
//!    directory index where possible ([`IncrementalScanner`])
//! 2. **Classify** - Group them by the requested [`Method`]
//!    ([`Classifier`])
//!
//! A search can run on the calling thread ([`DuplicateFinder::find_duplicates`])
//! or on a dedicated background thread ([`DuplicateFinder::spawn`]) that
//! reports [`SearchEvent`]s over a channel.
//!
//! If classification fails for any reason other than cancellation, the
//! search still succeeds: it returns no groups, the number of files that
//! were scanned, and the failure message (which is also delivered to the
//! progress callback's `on_error`).
//!
//! # Example
//!
//! ```no_run
//! use audiodupe::duplicates::{DuplicateFinder, FinderConfig, Method, SearchRequest};
//!
//! let finder = DuplicateFinder::new(FinderConfig::default().with_io_threads(4));
//! let request = SearchRequest::new("/music", Method::Hash);
//!
//! let outcome = finder.find_duplicates(&request).unwrap();
//! println!("{} groups among {} files", outcome.groups.len(), outcome.total_files);
//! ```

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::classifier::{ClassifyError, Classifier, Method, DEFAULT_IO_THREADS};
use super::groups::DuplicateGroup;
use crate::index::IndexStore;
use crate::progress::ProgressCallback;
use crate::scanner::{FileMetadataCache, IncrementalScanner, PathNormalizer, ScanError, ScanStats};

/// Configuration for the duplicate finder.
#[derive(Clone)]
pub struct FinderConfig {
    /// Number of I/O threads for parallel hashing.
    /// Default is 4 to prevent disk thrashing.
    pub io_threads: usize,
    /// Follow symbolic links while walking.
    pub follow_symlinks: bool,
    /// Directory index; `None` disables incremental scanning.
    pub index: Option<IndexStore>,
    /// Metadata cache shared across searches; a fresh one per search if `None`.
    pub metadata: Option<Arc<FileMetadataCache>>,
    /// Path normalizer; the platform default if `None`.
    pub normalizer: Option<Arc<PathNormalizer>>,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback for reporting.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinderConfig")
            .field("io_threads", &self.io_threads)
            .field("follow_symlinks", &self.follow_symlinks)
            .field("index", &self.index)
            .field("metadata", &self.metadata.as_ref().map(|_| "<cache>"))
            .field("normalizer", &self.normalizer)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            io_threads: DEFAULT_IO_THREADS,
            follow_symlinks: false,
            index: None,
            metadata: None,
            normalizer: None,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl FinderConfig {
    /// Set the number of hashing threads.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Follow symbolic links while walking.
    #[must_use]
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Use a directory index.
    #[must_use]
    pub fn with_index(mut self, store: IndexStore) -> Self {
        self.index = Some(store);
        self
    }

    /// Share a metadata cache across searches.
    #[must_use]
    pub fn with_metadata_cache(mut self, cache: Arc<FileMetadataCache>) -> Self {
        self.metadata = Some(cache);
        self
    }

    /// Use a specific path normalizer.
    #[must_use]
    pub fn with_normalizer(mut self, normalizer: Arc<PathNormalizer>) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }
}

/// What to search for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Directory to search
    pub root: PathBuf,
    /// Classification method
    pub method: Method,
    /// Deepest containing directory relative to the root (0 = unlimited)
    pub max_depth: usize,
    /// Smallest file size in bytes
    pub min_size: u64,
}

impl SearchRequest {
    /// Search `root` with `method`, no depth limit and no size floor.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, method: Method) -> Self {
        Self {
            root: root.into(),
            method,
            max_depth: 0,
            min_size: 0,
        }
    }

    /// Limit the directory depth.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Skip files smaller than `min_size` bytes.
    #[must_use]
    pub fn with_min_size(mut self, min_size: u64) -> Self {
        self.min_size = min_size;
        self
    }
}

/// Result of a search.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Normalized root that was searched
    pub root: PathBuf,
    /// Classification method used
    pub method: Method,
    /// Duplicate groups, ordered by key
    pub groups: Vec<DuplicateGroup>,
    /// Number of audio files considered
    pub total_files: usize,
    /// How the scan was answered
    pub stats: ScanStats,
    /// Classification failure, if any (groups are empty when set)
    pub error: Option<String>,
    /// Wall-clock duration of the search
    pub duration: Duration,
}

/// Errors that can occur during duplicate finding.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The search was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Search interrupted by user")]
    Interrupted,

    /// The root could not be scanned.
    #[error(transparent)]
    Scan(ScanError),

    /// The background thread could not be started.
    #[error("Failed to start search thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The background thread ended without reporting a result.
    #[error("Search thread terminated unexpectedly")]
    WorkerLost,
}

impl From<ScanError> for FinderError {
    fn from(error: ScanError) -> Self {
        match error {
            ScanError::Interrupted => Self::Interrupted,
            other => Self::Scan(other),
        }
    }
}

/// Message from a background search.
#[derive(Debug)]
pub enum SearchEvent {
    /// Progress checkpoint
    Progress {
        /// What the search is doing
        message: String,
        /// Overall completion, 0 to 100
        percent: u8,
    },
    /// Classification failed (the search still finishes)
    Error(String),
    /// Final result; always the last event
    Finished(Result<SearchOutcome, FinderError>),
}

/// Forwards progress to a channel and, optionally, another callback.
struct ChannelProgress {
    tx: Sender<SearchEvent>,
    inner: Option<Arc<dyn ProgressCallback>>,
}

impl ProgressCallback for ChannelProgress {
    fn on_progress(&self, message: &str, percent: u8) {
        // The receiver may be gone; progress is advisory.
        let _ = self.tx.send(SearchEvent::Progress {
            message: message.to_string(),
            percent,
        });
        if let Some(inner) = &self.inner {
            inner.on_progress(message, percent);
        }
    }

    fn on_error(&self, message: &str) {
        let _ = self.tx.send(SearchEvent::Error(message.to_string()));
        if let Some(inner) = &self.inner {
            inner.on_error(message);
        }
    }
}

/// Handle to a search running on a background thread.
#[derive(Debug)]
pub struct SearchHandle {
    events: Receiver<SearchEvent>,
    thread: JoinHandle<()>,
}

impl SearchHandle {
    /// Block until the next event; `None` once the search thread is gone.
    pub fn next_event(&self) -> Option<SearchEvent> {
        self.events.recv().ok()
    }

    /// Wait for the result, discarding intermediate events.
    ///
    /// # Errors
    ///
    /// Returns the search's own error, or [`FinderError::WorkerLost`] if the
    /// thread died without reporting.
    pub fn wait(self) -> Result<SearchOutcome, FinderError> {
        self.wait_with(None)
    }

    /// Wait for the result, forwarding intermediate events to `callback`.
    ///
    /// # Errors
    ///
    /// Same as [`SearchHandle::wait`].
    pub fn wait_with(
        self,
        callback: Option<&dyn ProgressCallback>,
    ) -> Result<SearchOutcome, FinderError> {
        let mut result = None;
        while let Ok(event) = self.events.recv() {
            match event {
                SearchEvent::Progress { message, percent } => {
                    if let Some(cb) = callback {
                        cb.on_progress(&message, percent);
                    }
                }
                SearchEvent::Error(message) => {
                    if let Some(cb) = callback {
                        cb.on_error(&message);
                    }
                }
                SearchEvent::Finished(outcome) => {
                    result = Some(outcome);
                    break;
                }
            }
        }

        if self.thread.join().is_err() {
            log::error!("Search thread panicked");
        }
        result.unwrap_or(Err(FinderError::WorkerLost))
    }
}

/// Duplicate finder that orchestrates scanning and classification.
#[derive(Debug)]
pub struct DuplicateFinder {
    config: FinderConfig,
    normalizer: Arc<PathNormalizer>,
}

impl DuplicateFinder {
    /// Create a new duplicate finder with the given configuration.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        let normalizer = config
            .normalizer
            .clone()
            .unwrap_or_else(|| Arc::new(PathNormalizer::default()));
        Self { config, normalizer }
    }

    /// Create a new duplicate finder with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(FinderConfig::default())
    }

    /// Run a search on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::Scan`] if the root cannot be scanned and
    /// [`FinderError::Interrupted`] if shutdown was requested. A failed
    /// classification is reported through [`SearchOutcome::error`].
    pub fn find_duplicates(&self, request: &SearchRequest) -> Result<SearchOutcome, FinderError> {
        self.run(request, self.config.progress_callback.clone())
    }

    /// Run a search on a dedicated background thread.
    ///
    /// Progress and classification errors are delivered as [`SearchEvent`]s
    /// (and to the configured progress callback, if any).
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::Spawn`] if the thread cannot be started.
    pub fn spawn(self: &Arc<Self>, request: SearchRequest) -> Result<SearchHandle, FinderError> {
        let (tx, events) = mpsc::channel();
        let finder = Arc::clone(self);

        let thread = thread::Builder::new()
            .name("audiodupe-search".to_string())
            .spawn(move || {
                let progress: Arc<dyn ProgressCallback> = Arc::new(ChannelProgress {
                    tx: tx.clone(),
                    inner: finder.config.progress_callback.clone(),
                });
                let result = finder.run(&request, Some(progress));
                let _ = tx.send(SearchEvent::Finished(result));
            })
            .map_err(FinderError::Spawn)?;

        Ok(SearchHandle { events, thread })
    }

    fn run(
        &self,
        request: &SearchRequest,
        progress: Option<Arc<dyn ProgressCallback>>,
    ) -> Result<SearchOutcome, FinderError> {
        let start = Instant::now();
        let report = |message: &str, percent: u8| {
            if let Some(cb) = &progress {
                cb.on_progress(message, percent);
            }
        };

        report(&format!("Scanning {}", request.root.display()), 0);

        let metadata = self.config.metadata.clone().unwrap_or_else(|| {
            let cache = FileMetadataCache::new();
            Arc::new(match &self.config.shutdown_flag {
                Some(flag) => cache.with_shutdown_flag(Arc::clone(flag)),
                None => cache,
            })
        });

        let mut scanner = IncrementalScanner::new(Arc::clone(&self.normalizer), Arc::clone(&metadata))
            .with_follow_symlinks(self.config.follow_symlinks);
        if let Some(store) = &self.config.index {
            scanner = scanner.with_index(store.clone());
        }
        if let Some(flag) = &self.config.shutdown_flag {
            scanner = scanner.with_shutdown_flag(Arc::clone(flag));
        }

        let scanned = scanner.scan(&request.root, request.max_depth, request.min_size)?;
        let total_files = scanned.records.len();
        report(&format!("Found {total_files} audio files"), 40);

        let mut classifier = Classifier::new(metadata).with_io_threads(self.config.io_threads);
        if let Some(flag) = &self.config.shutdown_flag {
            classifier = classifier.with_shutdown_flag(Arc::clone(flag));
        }
        if let Some(cb) = &progress {
            classifier = classifier.with_progress(Arc::clone(cb));
        }

        let (groups, error) = match classifier.classify(scanned.records, request.method) {
            Ok(groups) => (groups, None),
            Err(ClassifyError::Interrupted) => return Err(FinderError::Interrupted),
            Err(e) => {
                let message = format!("Duplicate classification failed: {e}");
                log::error!("{}", message);
                if let Some(cb) = &progress {
                    cb.on_error(&message);
                }
                (Vec::new(), Some(message))
            }
        };

        report("Search complete", 100);
        Ok(SearchOutcome {
            root: scanned.root,
            method: request.method,
            groups,
            total_files,
            stats: scanned.stats,
            error,
            duration: start.elapsed(),
        })
    }
}
