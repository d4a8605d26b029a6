//! On-disk index document.

use serde::{Deserialize, Serialize};

use crate::scanner::FileRecord;

/// One file in a persisted index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Normalized absolute path
    pub path: String,
    /// Size in bytes at save time
    pub size: u64,
    /// Modification time in fractional seconds since the UNIX epoch
    pub mtime: f64,
    /// Existence flag at save time
    #[serde(default = "default_exists")]
    pub exists: bool,
}

fn default_exists() -> bool {
    true
}

impl From<&FileRecord> for IndexEntry {
    fn from(record: &FileRecord) -> Self {
        Self {
            path: record.path.to_string_lossy().into_owned(),
            size: record.size,
            mtime: record.mtime_secs(),
            exists: record.exists,
        }
    }
}

/// A persisted directory index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    /// Normalized root the snapshot was taken for
    pub root_dir: String,
    /// Creation time in fractional seconds since the UNIX epoch
    pub timestamp: f64,
    /// Files under the root
    pub files: Vec<IndexEntry>,
}
