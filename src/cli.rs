//! Command-line interface definitions for audiodupe.
//!
//! This module defines all CLI arguments, subcommands, and options using the clap derive API.
//! Options left unset fall back to the configuration file and environment
//! (see [`crate::config`]).
//!
//! # Example
//!
//! ```bash
//! # Group songs by "Title - Artist" file names (default method)
//! audiodupe scan ~/Music
//!
//! # Byte-identical copies only, as JSON
//! audiodupe scan ~/Music --method hash --output json
//!
//! # Mark redundant copies, keeping FLAC first and never touching ~/Music/Archive
//! audiodupe scan ~/Music --select --priority flac=1 --priority mp3=2 --exclude-dir ~/Music/Archive
//!
//! # Forget the directory index for a library
//! audiodupe clear-index ~/Music
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::duplicates::Method;

/// Duplicate audio file finder.
///
/// audiodupe finds duplicate songs by file name, size, or content hash, and
/// remembers directory listings between runs so that rescanning a large,
/// mostly unchanged library is fast.
#[derive(Debug, Parser)]
#[command(name = "audiodupe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Report fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a directory for duplicate audio files
    Scan(ScanArgs),
    /// Delete the saved directory index for a path
    ClearIndex(ClearIndexArgs),
    /// Print the effective configuration as TOML
    Config,
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory to scan
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// How to decide that two files are duplicates
    #[arg(short, long, value_enum)]
    pub method: Option<Method>,

    /// Deepest directory level to search below PATH (0 = unlimited)
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,

    /// Minimum file size to consider (e.g., 500KB, 1MiB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Select redundant copies in every group for deletion
    ///
    /// Nothing is deleted; selected files are marked in the output.
    #[arg(long)]
    pub select: bool,

    /// Format rank used when selecting (lower is kept first), e.g. flac=1
    ///
    /// Can be specified multiple times. Replaces the configured ranking.
    #[arg(long = "priority", value_name = "EXT=RANK", value_parser = parse_priority)]
    pub priorities: Vec<(String, u32)>,

    /// Keep the smaller file when formats rank equally
    #[arg(long)]
    pub prefer_smaller: bool,

    /// Keep the older file when formats and sizes are equal
    #[arg(long)]
    pub prefer_oldest: bool,

    /// Directory whose files are never selected (can be repeated)
    #[arg(long = "exclude-dir", value_name = "DIR")]
    pub exclude_dirs: Vec<PathBuf>,

    /// Directory whose files are selected first (can be repeated)
    #[arg(long = "delete-dir", value_name = "DIR")]
    pub delete_dirs: Vec<PathBuf>,

    /// Only select among files sharing the same file stem
    #[arg(long)]
    pub skip_different_names: bool,

    /// Directory holding the index files
    #[arg(long, value_name = "DIR", conflicts_with = "no_index")]
    pub index_dir: Option<PathBuf>,

    /// Walk the whole tree without reading or writing an index
    #[arg(long)]
    pub no_index: bool,

    /// Follow symbolic links during scan
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Number of I/O threads for hashing (default: 4)
    ///
    /// Lower values reduce disk thrashing on HDDs.
    #[arg(long, value_name = "N")]
    pub io_threads: Option<usize>,
}

/// Arguments for the clear-index subcommand.
#[derive(Debug, Args)]
pub struct ClearIndexArgs {
    /// Directory whose index should be removed
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Directory holding the index files
    #[arg(long, value_name = "DIR")]
    pub index_dir: Option<PathBuf>,
}

/// Output format for scan results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Grouped listing for terminals
    Text,
    /// JSON output for scripting
    Json,
    /// CSV output for spreadsheets
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use audiodupe::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1MiB").unwrap(), 1_048_576);
/// ```
///
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }
    if s.starts_with('-') {
        return Err("Size cannot be negative".to_string());
    }

    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let unit = unit.trim().to_ascii_uppercase();

    let value: f64 = number
        .parse()
        .map_err(|_| format!("Invalid number: '{number}'"))?;
    let multiplier = SIZE_UNITS
        .iter()
        .find(|(names, _)| names.contains(&unit.as_str()))
        .map(|(_, bytes)| *bytes)
        .ok_or_else(|| format!("Unknown size suffix: '{unit}'"))?;

    Ok((value * multiplier as f64) as u64)
}

const SIZE_UNITS: [(&[&str], u64); 9] = [
    (&["", "B"], 1),
    (&["K", "KB"], bytesize::KB),
    (&["KIB"], bytesize::KIB),
    (&["M", "MB"], bytesize::MB),
    (&["MIB"], bytesize::MIB),
    (&["G", "GB"], bytesize::GB),
    (&["GIB"], bytesize::GIB),
    (&["T", "TB"], bytesize::TB),
    (&["TIB"], bytesize::TIB),
];

/// Parse an `EXT=RANK` format priority.
///
/// The extension is lowercased and may carry a leading dot.
///
/// # Examples
///
/// ```
/// use audiodupe::cli::parse_priority;
///
/// assert_eq!(parse_priority("FLAC=1").unwrap(), ("flac".to_string(), 1));
/// assert_eq!(parse_priority(".mp3=4").unwrap(), ("mp3".to_string(), 4));
/// ```
///
/// # Errors
///
/// Returns an error if the `=` is missing, the extension is empty, or the
/// rank is not a non-negative integer.
pub fn parse_priority(s: &str) -> Result<(String, u32), String> {
    let (ext, rank) = s
        .split_once('=')
        .ok_or_else(|| format!("Expected EXT=RANK, got '{s}'"))?;

    let ext = ext.trim().trim_start_matches('.').to_lowercase();
    if ext.is_empty() {
        return Err("Extension cannot be empty".to_string());
    }

    let rank = rank
        .trim()
        .parse()
        .map_err(|_| format!("Invalid rank: '{}'", rank.trim()))?;
    Ok((ext, rank))
}
