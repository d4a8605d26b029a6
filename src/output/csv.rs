//! CSV output formatter.
//!
//! One row is generated for each file in a group.
//!
//! # Columns
//!
//! - `group_id`: 1-based group number
//! - `key`: Method-specific group key
//! - `path`: Normalized path to the file
//! - `size`: File size in bytes
//! - `modified`: Last modified time (RFC 3339 format)
//! - `hash`: Content hash (hex), empty when not computed
//! - `selected`: Whether the file was selected for deletion

use std::io;

use serde::Serialize;

use super::{format_time, OutputError, Report};

/// A single row in the CSV output.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    group_id: usize,
    key: &'a str,
    path: String,
    size: u64,
    modified: String,
    hash: String,
    selected: bool,
}

/// CSV output formatter.
pub struct CsvOutput<'a> {
    report: &'a Report<'a>,
}

impl<'a> CsvOutput<'a> {
    /// Create a new CSV output formatter.
    #[must_use]
    pub fn new(report: &'a Report<'a>) -> Self {
        Self { report }
    }

    /// Write the CSV output to the given writer.
    ///
    /// # Errors
    ///
    /// Returns `OutputError` if writing or serialization fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), OutputError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        for (idx, group) in self.report.outcome.groups.iter().enumerate() {
            for file in &group.files {
                csv_writer.serialize(CsvRow {
                    group_id: idx + 1,
                    key: &group.key,
                    path: file.path.to_string_lossy().into_owned(),
                    size: file.size,
                    modified: format_time(file.modified),
                    hash: file.hash.as_ref().and_then(|h| h.to_hex()).unwrap_or_default(),
                    selected: self.report.is_selected(&file.path),
                })?;
            }
        }

        csv_writer.flush()?;
        Ok(())
    }
}
