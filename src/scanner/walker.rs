//! Directory walker with subtree pruning.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct, which traverses a directory
//! tree and yields the paths of audio files. It uses [`walkdir`], whose
//! `filter_entry` lets the caller prune whole subtrees before they are
//! read. The incremental scanner relies on that to skip directories whose
//! mtimes show nothing changed since the index was written.
//!
//! # Features
//!
//! - Deterministic output (entries sorted by file name)
//! - Caller-supplied pruning predicate evaluated for every directory,
//!   including the root
//! - Depth limit relative to the root
//! - Configurable symlink following with loop detection
//! - Graceful shutdown via atomic flag
//!
//! # Example
//!
//! ```no_run
//! use audiodupe::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/home/user/Music"), WalkerConfig::default());
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(path) => println!("{}", path.display()),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use walkdir::{DirEntry, FilterEntry, WalkDir};

use super::{is_audio_file, ScanError, WalkerConfig};

/// Directory walker for audio file discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given path.
    ///
    /// # Arguments
    ///
    /// * `path` - Root directory to scan
    /// * `config` - Walker configuration options
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set to `true`, the walker yields a single
    /// [`ScanError::Interrupted`] and stops.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Walk the whole tree, yielding audio file paths.
    pub fn walk(&self) -> AudioFiles<impl FnMut(&DirEntry) -> bool> {
        self.walk_pruned(|_: &Path| true)
    }

    /// Walk the tree, descending only into directories for which
    /// `should_descend` returns `true`.
    ///
    /// The predicate also sees the root; rejecting it yields nothing.
    /// Errors are yielded as [`ScanError`] values rather than stopping
    /// iteration.
    pub fn walk_pruned<F>(&self, mut should_descend: F) -> AudioFiles<impl FnMut(&DirEntry) -> bool>
    where
        F: FnMut(&Path) -> bool,
    {
        let mut walk_dir = WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name();

        // Files directly in the root live at walkdir depth 1.
        if self.config.max_depth > 0 {
            walk_dir = walk_dir.max_depth(self.config.max_depth + 1);
        }

        let inner = walk_dir.into_iter().filter_entry(move |entry| {
            if entry.file_type().is_dir() {
                let descend = should_descend(entry.path());
                if !descend {
                    log::trace!("Pruning unchanged directory: {}", entry.path().display());
                }
                descend
            } else {
                true
            }
        });

        AudioFiles {
            inner,
            root: self.root.clone(),
            shutdown_flag: self.shutdown_flag.clone(),
            finished: false,
        }
    }
}

/// Iterator over the audio files found by a [`Walker`].
pub struct AudioFiles<P>
where
    P: FnMut(&DirEntry) -> bool,
{
    inner: FilterEntry<walkdir::IntoIter, P>,
    root: PathBuf,
    shutdown_flag: Option<Arc<AtomicBool>>,
    finished: bool,
}

impl<P> AudioFiles<P>
where
    P: FnMut(&DirEntry) -> bool,
{
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Convert a walkdir error to a [`ScanError`].
    fn handle_walk_error(&self, error: walkdir::Error) -> ScanError {
        let path = error
            .path()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);

        if let Some(ancestor) = error.loop_ancestor() {
            let ancestor = ancestor.to_path_buf();
            log::warn!(
                "Skipping symlink loop: {} -> {}",
                path.display(),
                ancestor.display()
            );
            return ScanError::SymlinkLoop { path, ancestor };
        }

        let message = error.to_string();
        match error.into_io_error() {
            Some(io) => {
                log::warn!("Walker error for {}: {}", path.display(), io);
                ScanError::from_io(&path, io)
            }
            None => ScanError::Io {
                path,
                source: std::io::Error::other(message),
            },
        }
    }
}

impl<P> Iterator for AudioFiles<P>
where
    P: FnMut(&DirEntry) -> bool,
{
    type Item = Result<PathBuf, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            if self.is_shutdown_requested() {
                log::debug!("Walker: Shutdown requested, stopping iteration");
                self.finished = true;
                return Some(Err(ScanError::Interrupted));
            }

            match self.inner.next()? {
                Ok(entry) => {
                    // With follow_links the file type is the target's, so a
                    // remaining symlink here is one we must not follow.
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    if !is_audio_file(entry.path()) {
                        continue;
                    }
                    return Some(Ok(entry.into_path()));
                }
                Err(e) => return Some(Err(self.handle_walk_error(e))),
            }
        }
    }
}
