//! Persistent directory index.
//!
//! This module stores a snapshot of the audio files found under a scan
//! root so that later scans can skip directories that have not changed.
//!
//! # Architecture
//!
//! The index is split into two components:
//!
//! * [`store`]: Locates, reads, validates and atomically writes snapshots.
//! * [`entry`]: Defines the on-disk JSON document and its entries.
//!
//! # Invalidation
//!
//! A snapshot is used only when:
//! * it was written for the same normalized root,
//! * it is younger than the configured maximum age (24 hours by default).
//!
//! Each entry is then checked against a live stat. An entry whose size
//! differs, or whose mtime drifted by more than one second, is dropped and
//! the snapshot is rewritten without it.

pub mod entry;
pub mod store;

pub use entry::{IndexDocument, IndexEntry};
pub use store::{IndexError, IndexStore, LoadedIndex, DEFAULT_MAX_AGE, MTIME_TOLERANCE_SECS};
