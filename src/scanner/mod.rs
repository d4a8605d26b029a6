//! Scanner module for directory traversal, file metadata and content hashing.
//!
//! This module provides functionality for:
//! - Path normalization (UNC form, mapped network drives)
//! - Memoized stat snapshots and content hashes ([`FileMetadataCache`])
//! - Pruned directory walking over audio files ([`Walker`])
//! - Index-assisted incremental scanning ([`IncrementalScanner`])
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`path_utils`]: Canonical path forms and comparison keys
//! - [`hasher`]: BLAKE3 file hashing (streaming)
//! - [`metadata`]: Per-session stat and hash memoization
//! - [`walker`]: Directory traversal with subtree pruning
//! - [`incremental`]: Merges the persisted index with a fresh walk
//!
//! # Example
//!
//! ```no_run
//! use audiodupe::scanner::{FileMetadataCache, IncrementalScanner, PathNormalizer};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let scanner = IncrementalScanner::new(
//!     Arc::new(PathNormalizer::default()),
//!     Arc::new(FileMetadataCache::new()),
//! );
//! let output = scanner.scan(Path::new("/music"), 0, 0).unwrap();
//! println!("{} audio files", output.records.len());
//! ```

pub mod hasher;
pub mod incremental;
pub mod metadata;
pub mod path_utils;
pub mod walker;

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Re-export main types
pub use hasher::{hash_to_hex, Hash, Hasher};
pub use incremental::{IncrementalScanner, ScanOutput, ScanStats};
pub use metadata::FileMetadataCache;
pub use path_utils::{NetworkResolver, NoNetworkResolver, PathNormalizer};
pub use walker::Walker;

/// File extensions (lowercase, without the dot) recognized as audio.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "aac", "ogg", "m4a", "ape", "wma"];

/// Check whether a path carries one of the recognized audio extensions.
///
/// The comparison is case-insensitive: `Track.MP3` is an audio file.
#[must_use]
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            AUDIO_EXTENSIONS.contains(&ext.as_str())
        })
}

/// Result of hashing a file's full content.
///
/// `Unknown` is the sentinel for files that could not be read. Two
/// `Unknown` values are never treated as duplicates of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentHash {
    /// BLAKE3 digest of the full content
    Known(Hash),
    /// The content could not be read
    Unknown,
}

impl ContentHash {
    /// The digest, if it is known.
    #[must_use]
    pub fn known(&self) -> Option<&Hash> {
        match self {
            Self::Known(hash) => Some(hash),
            Self::Unknown => None,
        }
    }

    /// Full hexadecimal digest, if known.
    #[must_use]
    pub fn to_hex(&self) -> Option<String> {
        self.known().map(hash_to_hex)
    }
}

/// Stat snapshot of a single audio file.
///
/// The record is created without a content hash. Hashing is a separate,
/// explicit step ([`FileMetadataCache::hash`]) performed only by the
/// classification strategies that need it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Normalized absolute path (identity of the record)
    pub path: PathBuf,
    /// File size in bytes (0 when the file does not exist)
    pub size: u64,
    /// Last modification time (UNIX epoch when the file does not exist)
    pub modified: SystemTime,
    /// Whether the file existed when it was stat-ed
    pub exists: bool,
    /// Content hash, absent until computed
    pub hash: Option<ContentHash>,
}

impl FileRecord {
    /// Create a record for an existing file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the file
    /// * `size` - File size in bytes
    /// * `modified` - Last modification time
    #[must_use]
    pub fn new(path: PathBuf, size: u64, modified: SystemTime) -> Self {
        Self {
            path,
            size,
            modified,
            exists: true,
            hash: None,
        }
    }

    /// Create a record for a file that could not be stat-ed.
    #[must_use]
    pub fn missing(path: PathBuf) -> Self {
        Self {
            path,
            size: 0,
            modified: UNIX_EPOCH,
            exists: false,
            hash: None,
        }
    }

    /// Attach a computed content hash.
    #[must_use]
    pub fn with_hash(mut self, hash: ContentHash) -> Self {
        self.hash = Some(hash);
        self
    }

    /// Lowercased extension without the leading dot.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }

    /// File name including the extension.
    #[must_use]
    pub fn file_name(&self) -> Cow<'_, str> {
        self.path
            .file_name()
            .map_or(Cow::Borrowed(""), |name| name.to_string_lossy())
    }

    /// File name without the extension.
    #[must_use]
    pub fn file_stem(&self) -> Cow<'_, str> {
        self.path
            .file_stem()
            .map_or(Cow::Borrowed(""), |stem| stem.to_string_lossy())
    }

    /// Modification time as fractional seconds since the UNIX epoch.
    #[must_use]
    pub fn mtime_secs(&self) -> f64 {
        system_time_to_secs(self.modified)
    }
}

/// Convert a [`SystemTime`] into fractional seconds since the UNIX epoch.
///
/// Times before the epoch are returned as negative values.
#[must_use]
pub fn system_time_to_secs(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_secs_f64(),
        Err(before) => -before.duration().as_secs_f64(),
    }
}

/// Convert fractional seconds since the UNIX epoch into a [`SystemTime`].
///
/// Returns `None` for non-finite input and for values the platform clock
/// cannot represent.
#[must_use]
pub fn secs_to_system_time(secs: f64) -> Option<SystemTime> {
    if secs >= 0.0 {
        UNIX_EPOCH.checked_add(Duration::try_from_secs_f64(secs).ok()?)
    } else {
        UNIX_EPOCH.checked_sub(Duration::try_from_secs_f64(-secs).ok()?)
    }
}

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Follow symbolic links during traversal.
    /// Symlink loops are detected and skipped.
    pub follow_symlinks: bool,

    /// Maximum depth of the directory containing a file, relative to the
    /// root (files directly in the root are at depth 0). 0 means unlimited.
    pub max_depth: usize,
}

impl WalkerConfig {
    /// Create a new walker configuration.
    ///
    /// # Arguments
    ///
    /// * `follow_symlinks` - Whether to follow symbolic links
    /// * `max_depth` - Maximum directory depth (0 = unlimited)
    #[must_use]
    pub fn new(follow_symlinks: bool, max_depth: usize) -> Self {
        Self {
            follow_symlinks,
            max_depth,
        }
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// A symbolic link points back to one of its ancestors.
    #[error("Symlink loop at {path} (points to {ancestor})")]
    SymlinkLoop {
        /// Path of the looping link
        path: PathBuf,
        /// Ancestor directory the link resolves to
        ancestor: PathBuf,
    },

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The scan was cancelled through the shutdown flag.
    #[error("Scan interrupted")]
    Interrupted,
}

impl ScanError {
    /// Map an I/O error on `path` to the most specific variant.
    #[must_use]
    pub fn from_io(path: &Path, error: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::NotFound => Self::PathNotFound(path.to_path_buf()),
            ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    /// Whether retrying the read could succeed.
    ///
    /// Missing files and permission failures are permanent; everything
    /// else (interrupted reads, network hiccups) is worth another attempt.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}
