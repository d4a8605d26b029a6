//! Ctrl+C handling.
//!
//! A single process-wide [`ShutdownHandler`] owns an `AtomicBool` that is
//! set when the user interrupts. The flag is handed to the walker, the
//! metadata cache and the classifier, which stop at their next checkpoint.
//!
//! ```rust,no_run
//! use audiodupe::duplicates::FinderConfig;
//! use audiodupe::signal::install_handler;
//!
//! let handler = install_handler().expect("signal handler");
//! let config = FinderConfig::default().with_shutdown_flag(handler.get_flag());
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a handler with no shutdown requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an interrupt (or [`request_shutdown`](Self::request_shutdown)) happened.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request cancellation without a signal.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// The flag to pass to searches.
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Clear the flag so the handler can serve another search.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

/// Install the Ctrl+C hook once per process and return its handler.
///
/// Later calls return the same handler with its flag cleared. If another
/// hook is already registered (the case in parallel tests, or when embedded
/// in a host that owns Ctrl+C), an unhooked handler is returned instead; it
/// still honours `request_shutdown`.
///
/// # Errors
///
/// Returns [`SignalError::InstallFailed`] when the platform refuses the hook
/// for any other reason.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let flag = handler.get_flag();
    accept_hook(ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        let _ = writeln!(std::io::stderr(), "\nInterrupted. Stopping search...");
        let _ = std::io::stderr().flush();
        log::info!("Shutdown signal received");
    }))?;

    Ok(GLOBAL_HANDLER.get_or_init(|| handler).clone())
}

/// A hook registered by someone else is tolerated; anything else is fatal.
fn accept_hook(result: Result<(), ctrlc::Error>) -> Result<(), SignalError> {
    match result {
        Ok(()) => Ok(()),
        Err(ctrlc::Error::MultipleHandlers) => {
            log::debug!("Ctrl+C hook already taken, using unhooked handler");
            Ok(())
        }
        Err(e) => Err(SignalError::InstallFailed(e)),
    }
}
