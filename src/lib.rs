//! audiodupe - Duplicate Audio File Finder
//!
//! Finds duplicate songs in a music library by file name, size, or content
//! hash. Directory listings are remembered in a per-root index, so rescans of
//! a large and mostly unchanged library skip the unchanged directories.
//!
//! The library is organised as a pipeline:
//!
//! - [`scanner`] walks a root and produces [`scanner::FileRecord`]s, using
//!   the [`index`] to skip unchanged directories
//! - [`duplicates`] groups records by a [`duplicates::Method`] and runs whole
//!   searches, in the foreground or on a worker thread
//! - [`resolution`] decides which copies in a group to keep
//! - [`output`] renders the result as text, JSON or CSV

pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod index;
pub mod logging;
pub mod output;
pub mod progress;
pub mod resolution;
pub mod scanner;
pub mod signal;

use std::io;
use std::sync::Arc;

use anyhow::Context;

use cli::{ClearIndexArgs, Cli, Commands, OutputFormat, ScanArgs};
use config::Config;
use duplicates::{DuplicateFinder, FinderConfig, SearchOutcome, SearchRequest};
use error::ExitCode;
use index::IndexStore;
use output::{CsvOutput, JsonOutput, Report, TextOutput};
use progress::Progress;
use resolution::Resolution;
use scanner::PathNormalizer;

/// Run the command-line application.
///
/// # Errors
///
/// Returns an error when the search cannot run (bad root, interrupted) or
/// the report cannot be written. A failed classification is not an error;
/// it yields [`ExitCode::ClassificationFailed`].
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    let mut config = Config::load(cli.config.as_deref());

    match cli.command {
        Commands::Scan(args) => {
            apply_scan_args(&mut config, &args);
            run_scan(&args, &config, cli.quiet)
        }
        Commands::ClearIndex(args) => clear_index(&args, &config),
        Commands::Config => {
            print!("{}", config.to_toml().context("Failed to render configuration")?);
            Ok(ExitCode::Success)
        }
    }
}

/// Overlay command-line flags on the loaded configuration.
pub fn apply_scan_args(config: &mut Config, args: &ScanArgs) {
    if let Some(method) = args.method {
        config.method = method;
    }
    if let Some(depth) = args.max_depth {
        config.max_depth = depth;
    }
    if let Some(size) = args.min_size {
        config.min_size = size;
    }
    if let Some(threads) = args.io_threads {
        config.io_threads = threads;
    }
    if let Some(dir) = &args.index_dir {
        config.index_dir = Some(dir.clone());
    }
    config.follow_symlinks |= args.follow_symlinks;

    let resolution = &mut config.resolution;
    if !args.priorities.is_empty() {
        resolution.format_priority = args.priorities.iter().cloned().collect();
    }
    if args.prefer_smaller {
        resolution.prefer_larger = false;
    }
    resolution.prefer_oldest |= args.prefer_oldest;
    resolution.skip_different_names |= args.skip_different_names;
    resolution.exclude_dirs.extend(args.exclude_dirs.iter().cloned());
    resolution.delete_dirs.extend(args.delete_dirs.iter().cloned());
}

fn run_scan(args: &ScanArgs, config: &Config, quiet: bool) -> anyhow::Result<ExitCode> {
    let handler = signal::install_handler()?;

    let mut finder_config = FinderConfig::default()
        .with_io_threads(config.io_threads)
        .with_follow_symlinks(config.follow_symlinks)
        .with_shutdown_flag(handler.get_flag());
    if args.no_index {
        log::debug!("Index disabled by --no-index");
    } else {
        match config.index_store() {
            Ok(store) => finder_config = finder_config.with_index(store),
            Err(e) => log::warn!("Scanning without an index: {e:#}"),
        }
    }

    let request = SearchRequest::new(&args.path, config.method)
        .with_max_depth(config.max_depth)
        .with_min_size(config.min_size);
    log::info!(
        "Searching {} for duplicates by {}",
        request.root.display(),
        request.method
    );

    let finder = Arc::new(DuplicateFinder::new(finder_config));
    let progress = Progress::new(quiet);
    let handle = finder.spawn(request).context("Failed to start search")?;
    let result = handle.wait_with(Some(&progress));
    progress.finish();
    let outcome =
        result.with_context(|| format!("Search of {} failed", args.path.display()))?;

    let exit_code = exit_code_for(&outcome);
    let resolutions: Option<Vec<Resolution>> = args.select.then(|| {
        outcome
            .groups
            .iter()
            .map(|g| resolution::resolve(g, &config.resolution))
            .collect()
    });

    let mut report = Report::new(&outcome, exit_code);
    if let Some(resolutions) = &resolutions {
        report = report.with_selection(resolutions);
    }

    let stdout = io::stdout().lock();
    match args.output {
        OutputFormat::Text => TextOutput::new(&report).write_to(stdout),
        OutputFormat::Json => JsonOutput::new(&report).write_to(stdout),
        OutputFormat::Csv => CsvOutput::new(&report).write_to(stdout),
    }
    .context("Failed to write report")?;

    Ok(exit_code)
}

/// Exit code for a completed search.
#[must_use]
pub fn exit_code_for(outcome: &SearchOutcome) -> ExitCode {
    if outcome.error.is_some() {
        ExitCode::ClassificationFailed
    } else if outcome.groups.is_empty() {
        ExitCode::NoDuplicates
    } else {
        ExitCode::Success
    }
}

fn clear_index(args: &ClearIndexArgs, config: &Config) -> anyhow::Result<ExitCode> {
    let store = match &args.index_dir {
        Some(dir) => IndexStore::new(dir),
        None => config.index_store()?,
    };

    let absolute = std::path::absolute(&args.path)
        .with_context(|| format!("Invalid path: {}", args.path.display()))?;
    let root = PathNormalizer::default().normalize(&absolute);

    if store
        .remove(&root)
        .with_context(|| format!("Failed to remove index for {}", root.display()))?
    {
        log::info!("Removed index for {}", root.display());
    } else {
        log::info!("No index stored for {}", root.display());
    }
    Ok(ExitCode::Success)
}
