//! JSON output formatter.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "groups": [
//!     {
//!       "key": "4096",
//!       "label": "Size: 4.0 KiB",
//!       "files": [
//!         {
//!           "path": "/music/a.mp3",
//!           "size": 4096,
//!           "modified": "2023-11-14T22:13:20+00:00",
//!           "hash": "abab...",
//!           "selected": false
//!         }
//!       ]
//!     }
//!   ],
//!   "summary": {
//!     "root": "/music",
//!     "method": "size",
//!     "total_files": 3,
//!     "groups": 1,
//!     "files_in_groups": 2,
//!     "duplicate_files": 1,
//!     "wasted_space": 4096,
//!     "selected_files": 0,
//!     "selected_size": 0,
//!     "duration_ms": 12,
//!     "error": null,
//!     "exit_code": 0,
//!     "exit_code_name": "AD000",
//!     "scan": { "cached_files": 0, "new_files": 3, ... }
//!   }
//! }
//! ```

use std::io::Write;

use serde::Serialize;

use super::{format_time, OutputError, Report};
use crate::duplicates::{DuplicateGroup, GroupSummary, Method};
use crate::scanner::{FileRecord, ScanStats};

/// One file in a group.
#[derive(Debug, Clone, Serialize)]
pub struct JsonFile {
    /// Normalized path
    pub path: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification time (RFC 3339)
    pub modified: String,
    /// Content hash, when the method computed one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Selected for deletion
    pub selected: bool,
}

impl JsonFile {
    fn from_record(record: &FileRecord, report: &Report<'_>) -> Self {
        Self {
            path: record.path.to_string_lossy().into_owned(),
            size: record.size,
            modified: format_time(record.modified),
            hash: record.hash.as_ref().and_then(|h| h.to_hex()),
            selected: report.is_selected(&record.path),
        }
    }
}

/// A duplicate group in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonGroup {
    /// Method-specific key
    pub key: String,
    /// Display label
    pub label: String,
    /// Members in path order
    pub files: Vec<JsonFile>,
}

impl JsonGroup {
    fn from_group(group: &DuplicateGroup, report: &Report<'_>) -> Self {
        Self {
            key: group.key.clone(),
            label: group.label.clone(),
            files: group
                .files
                .iter()
                .map(|f| JsonFile::from_record(f, report))
                .collect(),
        }
    }
}

/// Summary statistics in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Searched root
    pub root: String,
    /// Classification method
    pub method: Method,
    /// Audio files considered
    pub total_files: usize,
    /// Totals over the groups
    #[serde(flatten)]
    pub groups: GroupSummary,
    /// Files selected for deletion
    pub selected_files: usize,
    /// Combined size of the selected files
    pub selected_size: u64,
    /// Search duration in milliseconds
    pub duration_ms: u64,
    /// Classification failure, if any
    pub error: Option<String>,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "AD000")
    pub exit_code_name: String,
    /// How the scan used the directory index
    pub scan: ScanStats,
}

/// Complete JSON output structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    /// Duplicate groups
    pub groups: Vec<JsonGroup>,
    /// Summary statistics
    pub summary: JsonSummary,
}

impl JsonOutput {
    /// Build the JSON document for a report.
    #[must_use]
    pub fn new(report: &Report<'_>) -> Self {
        let outcome = report.outcome;
        let (selected_files, selected_size) = report.selected_totals();
        Self {
            groups: outcome
                .groups
                .iter()
                .map(|g| JsonGroup::from_group(g, report))
                .collect(),
            summary: JsonSummary {
                root: outcome.root.to_string_lossy().into_owned(),
                method: outcome.method,
                total_files: outcome.total_files,
                groups: GroupSummary::from_groups(&outcome.groups),
                selected_files,
                selected_size,
                duration_ms: u64::try_from(outcome.duration.as_millis()).unwrap_or(u64::MAX),
                error: outcome.error.clone(),
                exit_code: report.exit_code.as_i32(),
                exit_code_name: report.exit_code.code_prefix().to_string(),
                scan: outcome.stats.clone(),
            },
        }
    }

    /// Serialize to a pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, OutputError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write pretty-printed JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), OutputError> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}
