//! Progress reporting.
//!
//! The search pipeline reports coarse checkpoints as a message plus a
//! percentage (0 to 100) through [`ProgressCallback`]. Reports are advisory:
//! nothing in the pipeline depends on them being delivered.
//!
//! [`Progress`] renders those reports as a single `indicatif` bar for the
//! command-line front end.

use std::sync::{Mutex, PoisonError};

use indicatif::{ProgressBar, ProgressStyle};

/// Receiver of search progress.
///
/// Implement this trait to observe a running search.
pub trait ProgressCallback: Send + Sync {
    /// Called at each checkpoint.
    ///
    /// # Arguments
    ///
    /// * `message` - What the search is doing
    /// * `percent` - Overall completion, 0 to 100
    fn on_progress(&self, message: &str, percent: u8);

    /// Called when the search fails after it has started.
    fn on_error(&self, _message: &str) {}
}

/// Progress reporter using indicatif.
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, nothing is displayed.
    ///
    /// # Examples
    ///
    /// ```
    /// use audiodupe::progress::Progress;
    ///
    /// let progress = Progress::new(false);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            quiet,
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█>-")
    }

    /// Clear the bar, leaving the last message on screen.
    pub fn finish(&self) {
        if let Some(pb) = self.bar.lock().unwrap_or_else(PoisonError::into_inner).take() {
            pb.finish_and_clear();
        }
    }
}

impl ProgressCallback for Progress {
    fn on_progress(&self, message: &str, percent: u8) {
        if self.quiet {
            return;
        }

        let mut bar = self.bar.lock().unwrap_or_else(PoisonError::into_inner);
        let pb = bar.get_or_insert_with(|| {
            let pb = ProgressBar::new(100);
            pb.set_style(Self::style());
            pb
        });
        pb.set_position(u64::from(percent.min(100)));
        pb.set_message(message.to_string());
    }

    fn on_error(&self, message: &str) {
        if self.quiet {
            return;
        }

        if let Some(pb) = self.bar.lock().unwrap_or_else(PoisonError::into_inner).take() {
            pb.abandon_with_message(message.to_string());
        }
    }
}
