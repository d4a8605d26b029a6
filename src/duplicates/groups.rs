//! Duplicate groups and partitioning helpers.
//!
//! # Overview
//!
//! A [`DuplicateGroup`] is the unit every classification strategy produces:
//! a method-specific key, a label for display, and at least two records
//! that compare equal under that method. Records inside a group are kept
//! in path order.
//!
//! # Example
//!
//! ```
//! use audiodupe::scanner::FileRecord;
//! use audiodupe::duplicates::group_by_size;
//! use std::path::PathBuf;
//! use std::time::SystemTime;
//!
//! let files = vec![
//!     FileRecord::new(PathBuf::from("/a.mp3"), 100, SystemTime::now()),
//!     FileRecord::new(PathBuf::from("/b.mp3"), 100, SystemTime::now()),
//!     FileRecord::new(PathBuf::from("/c.mp3"), 200, SystemTime::now()),
//! ];
//!
//! let groups = group_by_size(files);
//! assert_eq!(groups.len(), 1);
//! assert_eq!(groups[&100].len(), 2);
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use bytesize::ByteSize;
use serde::Serialize;

use crate::scanner::FileRecord;

/// Files that compare equal under one classification method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    /// Method-specific identity (size, hex digest, `title|artist`, ...)
    pub key: String,
    /// Human-readable description
    pub label: String,
    /// Members, ordered by path
    pub files: Vec<FileRecord>,
}

impl DuplicateGroup {
    /// Create a group, sorting its members by path.
    #[must_use]
    pub fn new(key: impl Into<String>, label: impl Into<String>, mut files: Vec<FileRecord>) -> Self {
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            key: key.into(),
            label: label.into(),
            files,
        }
    }

    /// Number of files in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Total size of all files in this group.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// Space taken by everything except the largest copy.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        let largest = self.files.iter().map(|f| f.size).max().unwrap_or(0);
        self.total_size().saturating_sub(largest)
    }

    /// Number of duplicate copies (total - 1 original).
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.files.len().saturating_sub(1)
    }

    /// Get just the paths of files in this group.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }
}

/// Totals over a set of groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    /// Number of groups
    pub groups: usize,
    /// Files that belong to some group
    pub files_in_groups: usize,
    /// Copies beyond the first in each group
    pub duplicate_files: usize,
    /// Sum of [`DuplicateGroup::wasted_space`]
    pub wasted_space: u64,
}

impl GroupSummary {
    /// Summarize a list of groups.
    #[must_use]
    pub fn from_groups(groups: &[DuplicateGroup]) -> Self {
        groups.iter().fold(Self::default(), |mut acc, g| {
            acc.groups += 1;
            acc.files_in_groups += g.len();
            acc.duplicate_files += g.duplicate_count();
            acc.wasted_space += g.wasted_space();
            acc
        })
    }
}

/// Partition records by `key`, keeping only partitions with 2+ members.
///
/// Partitions come back ordered by key.
pub fn partition_by<K, F>(records: impl IntoIterator<Item = FileRecord>, mut key: F) -> BTreeMap<K, Vec<FileRecord>>
where
    K: Ord,
    F: FnMut(&FileRecord) -> Option<K>,
{
    let mut partitions: BTreeMap<K, Vec<FileRecord>> = BTreeMap::new();
    for record in records {
        if let Some(k) = key(&record) {
            partitions.entry(k).or_default().push(record);
        }
    }
    partitions.retain(|_, members| members.len() > 1);
    partitions
}

/// Group records by exact byte size.
///
/// Only sizes shared by 2+ records are returned. No file I/O is performed.
#[must_use]
pub fn group_by_size(records: impl IntoIterator<Item = FileRecord>) -> BTreeMap<u64, Vec<FileRecord>> {
    partition_by(records, |r| Some(r.size))
}

/// Format a byte count with IEC units (KiB, MiB, GiB).
#[must_use]
pub fn format_size(bytes: u64) -> String {
    ByteSize::b(bytes).to_string()
}
