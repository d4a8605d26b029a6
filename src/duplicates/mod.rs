//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Size-based file grouping
//! - Content hash comparison (only among same-size files)
//! - Song-name grouping from `Title - Artist` file names
//! - Search orchestration, in the foreground or on a worker thread

pub mod classifier;
pub mod filename;
pub mod finder;
pub mod groups;

pub use classifier::{ClassifyError, Classifier, Method, DEFAULT_IO_THREADS};
pub use filename::{normalize_artist_name, parse_music_filename, song_key, strip_title_tags};
pub use finder::{
    DuplicateFinder, FinderConfig, FinderError, SearchEvent, SearchHandle, SearchOutcome,
    SearchRequest,
};
pub use groups::{format_size, group_by_size, partition_by, DuplicateGroup, GroupSummary};
