//! Output formatters for search results.
//!
//! This module provides different output formats for a [`Report`]:
//! - Text for terminals
//! - JSON for automation and scripting
//! - CSV for spreadsheet import
//!
//! # Example
//!
//! ```no_run
//! use audiodupe::duplicates::{DuplicateFinder, Method, SearchRequest};
//! use audiodupe::error::ExitCode;
//! use audiodupe::output::{json::JsonOutput, Report};
//!
//! let finder = DuplicateFinder::with_defaults();
//! let outcome = finder.find_duplicates(&SearchRequest::new(".", Method::Hash)).unwrap();
//!
//! let report = Report::new(&outcome, ExitCode::Success);
//! println!("{}", JsonOutput::new(&report).to_json_pretty().unwrap());
//! ```

pub mod csv;
pub mod json;
pub mod text;

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::duplicates::SearchOutcome;
use crate::error::ExitCode;
use crate::resolution::Resolution;

pub use self::csv::CsvOutput;
pub use json::JsonOutput;
pub use text::TextOutput;

/// Errors that can occur while writing a report.
#[derive(Debug, Error)]
pub enum OutputError {
    /// I/O error during writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error during JSON serialization.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error during CSV serialization.
    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),
}

/// A search outcome plus the optional deletion selection.
#[derive(Debug)]
pub struct Report<'a> {
    /// The search being reported
    pub outcome: &'a SearchOutcome,
    /// Exit code the process will end with
    pub exit_code: ExitCode,
    selected: Option<HashSet<PathBuf>>,
}

impl<'a> Report<'a> {
    /// Report without a selection.
    #[must_use]
    pub fn new(outcome: &'a SearchOutcome, exit_code: ExitCode) -> Self {
        Self {
            outcome,
            exit_code,
            selected: None,
        }
    }

    /// Mark the deletion candidates of `resolutions`.
    #[must_use]
    pub fn with_selection(mut self, resolutions: &[Resolution]) -> Self {
        self.selected = Some(
            resolutions
                .iter()
                .flat_map(|r| r.delete.iter().map(|f| f.path.clone()))
                .collect(),
        );
        self
    }

    /// Whether a selection was made at all.
    #[must_use]
    pub fn has_selection(&self) -> bool {
        self.selected.is_some()
    }

    /// Whether `path` is selected for deletion.
    #[must_use]
    pub fn is_selected(&self, path: &Path) -> bool {
        self.selected.as_ref().is_some_and(|s| s.contains(path))
    }

    /// Number of selected files and their combined size.
    #[must_use]
    pub fn selected_totals(&self) -> (usize, u64) {
        self.outcome
            .groups
            .iter()
            .flat_map(|g| &g.files)
            .filter(|f| self.is_selected(&f.path))
            .fold((0, 0), |(n, bytes), f| (n + 1, bytes + f.size))
    }
}

/// Format a modification time as RFC 3339.
pub(crate) fn format_time(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339()
}
