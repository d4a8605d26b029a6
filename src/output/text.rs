//! Plain-text report for terminals.
//!
//! ```text
//! Size: 4.0 KiB  (2 files, 4.0 KiB reclaimable)
//!   [delete] /music/b.mp3  4.0 KiB
//!            /music/a.mp3  4.0 KiB
//!
//! 1 group, 1 duplicate file, 4.0 KiB reclaimable among 3 audio files (12 ms)
//! ```

use std::io::Write;

use super::{OutputError, Report};
use crate::duplicates::{format_size, GroupSummary};

const DELETE_MARK: &str = "[delete] ";
const BLANK_MARK: &str = "         ";

/// Text output formatter.
pub struct TextOutput<'a> {
    report: &'a Report<'a>,
}

impl<'a> TextOutput<'a> {
    /// Create a new text formatter.
    #[must_use]
    pub fn new(report: &'a Report<'a>) -> Self {
        Self { report }
    }

    /// Write the report.
    ///
    /// # Errors
    ///
    /// Returns `OutputError` if writing fails.
    pub fn write_to<W: Write>(&self, mut w: W) -> Result<(), OutputError> {
        let report = self.report;
        let outcome = report.outcome;

        for group in &outcome.groups {
            writeln!(
                w,
                "{}  ({} files, {} reclaimable)",
                group.label,
                group.len(),
                format_size(group.wasted_space())
            )?;
            for file in &group.files {
                let mark = match (report.has_selection(), report.is_selected(&file.path)) {
                    (true, true) => DELETE_MARK,
                    (true, false) => BLANK_MARK,
                    (false, _) => "",
                };
                writeln!(
                    w,
                    "  {mark}{}  {}",
                    file.path.display(),
                    format_size(file.size)
                )?;
            }
            writeln!(w)?;
        }

        if let Some(error) = &outcome.error {
            writeln!(w, "Error: {error}")?;
        }

        let summary = GroupSummary::from_groups(&outcome.groups);
        writeln!(
            w,
            "{} {}, {} duplicate {}, {} reclaimable among {} audio files ({} ms)",
            summary.groups,
            plural(summary.groups, "group", "groups"),
            summary.duplicate_files,
            plural(summary.duplicate_files, "file", "files"),
            format_size(summary.wasted_space),
            outcome.total_files,
            outcome.duration.as_millis()
        )?;

        if report.has_selection() {
            let (count, bytes) = report.selected_totals();
            writeln!(
                w,
                "Selected {count} {} for deletion ({})",
                plural(count, "file", "files"),
                format_size(bytes)
            )?;
        }

        let stats = &outcome.stats;
        if stats.index_used {
            writeln!(
                w,
                "Index: {} cached, {} new, {} stale, {} directories skipped",
                stats.cached_files, stats.new_files, stats.stale_entries, stats.pruned_dirs
            )?;
        }

        w.flush()?;
        Ok(())
    }
}

fn plural<'s>(n: usize, one: &'s str, many: &'s str) -> &'s str {
    if n == 1 {
        one
    } else {
        many
    }
}
