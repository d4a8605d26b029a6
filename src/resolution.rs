//! Deletion recommendations for duplicate groups.
//!
//! # Overview
//!
//! Given a [`DuplicateGroup`] and [`ResolutionSettings`], the policy picks
//! one keeper and recommends every other eligible copy for deletion. It is
//! pure: no file is touched and no I/O happens.
//!
//! Records are ranked by, in order:
//!
//! 1. whether they live under a "delete from" directory (those lose),
//! 2. the configured rank of their format (lower rank wins, unknown formats
//!    lose to every configured one),
//! 3. size (larger wins by default),
//! 4. modification time (newer wins by default),
//! 5. path, so the outcome is reproducible.
//!
//! Records under an excluded directory are never selected and never take
//! part in ranking.
//!
//! # Example
//!
//! ```
//! use audiodupe::duplicates::DuplicateGroup;
//! use audiodupe::resolution::{select_for_deletion, ResolutionSettings};
//! use audiodupe::scanner::FileRecord;
//! use std::path::PathBuf;
//! use std::time::SystemTime;
//!
//! let now = SystemTime::now();
//! let group = DuplicateGroup::new("k", "Song", vec![
//!     FileRecord::new(PathBuf::from("/music/song.mp3"), 4_000_000, now),
//!     FileRecord::new(PathBuf::from("/music/song.flac"), 30_000_000, now),
//! ]);
//!
//! let selected = select_for_deletion(&group, &ResolutionSettings::default());
//! assert_eq!(selected.len(), 1);
//! assert_eq!(selected[0].path, PathBuf::from("/music/song.mp3"));
//! ```

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::duplicates::DuplicateGroup;
use crate::scanner::FileRecord;

/// Rank given to formats without a configured priority.
pub const UNRANKED: u32 = u32::MAX;

/// User preferences for choosing which copies to delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionSettings {
    /// Rank per extension (lower is better). Keys are compared
    /// case-insensitively, with or without a leading dot.
    pub format_priority: BTreeMap<String, u32>,
    /// Keep the larger copy (otherwise the smaller one)
    pub prefer_larger: bool,
    /// Keep the oldest copy (otherwise the newest one)
    pub prefer_oldest: bool,
    /// Records under these directories are never selected
    pub exclude_dirs: Vec<PathBuf>,
    /// Records under these directories are selected first
    pub delete_dirs: Vec<PathBuf>,
    /// Only rank copies whose file names (without extension) are identical
    pub skip_different_names: bool,
}

/// Configuration-layer defaults: lossless formats ranked first and the larger
/// copy kept. The resolution rules themselves assume none of this; an empty
/// `format_priority` ranks every extension as [`UNRANKED`].
impl Default for ResolutionSettings {
    fn default() -> Self {
        let format_priority = ["flac", "wav", "ape", "mp3", "m4a", "ogg", "wma"]
            .iter()
            .zip(1u32..)
            .map(|(ext, rank)| ((*ext).to_string(), rank))
            .collect();
        Self {
            format_priority,
            prefer_larger: true,
            prefer_oldest: false,
            exclude_dirs: Vec::new(),
            delete_dirs: Vec::new(),
            skip_different_names: false,
        }
    }
}

impl ResolutionSettings {
    /// Rank of a file extension, [`UNRANKED`] when not configured.
    #[must_use]
    pub fn priority_of(&self, extension: &str) -> u32 {
        let wanted = normalize_extension(extension);
        self.format_priority
            .iter()
            .find(|(ext, _)| normalize_extension(ext) == wanted)
            .map_or(UNRANKED, |(_, rank)| *rank)
    }

    /// Whether `path` lies under one of the excluded directories.
    #[must_use]
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.exclude_dirs.iter().any(|dir| dir_matches(dir, path))
    }

    /// Whether `path` lies under one of the preferred-deletion directories.
    #[must_use]
    pub fn in_delete_dir(&self, path: &Path) -> bool {
        self.delete_dirs.iter().any(|dir| dir_matches(dir, path))
    }

    fn compare(&self, a: &FileRecord, b: &FileRecord) -> Ordering {
        let ext_rank = |r: &FileRecord| r.extension().map_or(UNRANKED, |e| self.priority_of(&e));

        self.in_delete_dir(&a.path)
            .cmp(&self.in_delete_dir(&b.path))
            .then_with(|| ext_rank(a).cmp(&ext_rank(b)))
            .then_with(|| {
                if self.prefer_larger {
                    b.size.cmp(&a.size)
                } else {
                    a.size.cmp(&b.size)
                }
            })
            .then_with(|| {
                if self.prefer_oldest {
                    a.modified.cmp(&b.modified)
                } else {
                    b.modified.cmp(&a.modified)
                }
            })
            .then_with(|| a.path.cmp(&b.path))
    }
}

/// Keepers and deletion candidates for one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Records to keep (including excluded ones), in group order
    pub keep: Vec<FileRecord>,
    /// Records recommended for deletion, in group order
    pub delete: Vec<FileRecord>,
}

/// Records of `group` recommended for deletion, in group order.
#[must_use]
pub fn select_for_deletion(group: &DuplicateGroup, settings: &ResolutionSettings) -> Vec<FileRecord> {
    resolve(group, settings).delete
}

/// Split `group` into keepers and deletion candidates.
#[must_use]
pub fn resolve(group: &DuplicateGroup, settings: &ResolutionSettings) -> Resolution {
    let candidates: Vec<&FileRecord> = group
        .files
        .iter()
        .filter(|r| !settings.is_excluded(&r.path))
        .collect();

    let mut selected: HashSet<&Path> = HashSet::new();
    if settings.skip_different_names {
        let mut by_stem: BTreeMap<String, Vec<&FileRecord>> = BTreeMap::new();
        for record in candidates {
            by_stem
                .entry(record.file_stem().into_owned())
                .or_default()
                .push(record);
        }
        for members in by_stem.into_values() {
            selected.extend(rank_losers(members, settings));
        }
    } else {
        selected.extend(rank_losers(candidates, settings));
    }

    let (delete, keep): (Vec<FileRecord>, Vec<FileRecord>) = group
        .files
        .iter()
        .cloned()
        .partition(|r| selected.contains(r.path.as_path()));
    Resolution { keep, delete }
}

/// Everything but the best-ranked record.
fn rank_losers<'a>(mut members: Vec<&'a FileRecord>, settings: &ResolutionSettings) -> Vec<&'a Path> {
    if members.len() < 2 {
        return Vec::new();
    }
    members.sort_by(|a, b| settings.compare(a, b));
    members[1..].iter().map(|r| r.path.as_path()).collect()
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}

fn fold_case(component: &str) -> String {
    if cfg!(windows) {
        component.to_lowercase()
    } else {
        component.to_string()
    }
}

fn components(path: &Path) -> Vec<String> {
    path.components()
        .map(|c| fold_case(&c.as_os_str().to_string_lossy()))
        .collect()
}

/// An absolute `dir` matches paths below it; a relative one matches when its
/// components appear as a contiguous run of the path's parent directories.
fn dir_matches(dir: &Path, path: &Path) -> bool {
    if dir.is_absolute() {
        let dir = components(dir);
        let path = components(path);
        return path.len() > dir.len() && path.starts_with(&dir);
    }

    let needle: Vec<String> = components(dir)
        .into_iter()
        .filter(|c| c != ".")
        .collect();
    if needle.is_empty() {
        return false;
    }
    let parents = path.parent().map(components).unwrap_or_default();
    parents.windows(needle.len()).any(|run| run == needle.as_slice())
}
