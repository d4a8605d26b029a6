//! Canonical path forms and comparison keys.
//!
//! # Overview
//!
//! Every path that enters the index or a duplicate group goes through
//! [`PathNormalizer::normalize`] first, so the same file is always spelled
//! the same way:
//!
//! - UNC paths (`\\server\share` or `//server/share`) are rewritten to
//!   backslash form with exactly one leading `\\`.
//! - Local paths are normalized lexically (`.` dropped, `..` folded,
//!   repeated and trailing separators removed).
//! - Mapped network drives (`X:`) are resolved to their share through an
//!   injected [`NetworkResolver`] when one is available.
//!
//! Separately, [`path_key`] produces a Unicode NFC comparison key. macOS
//! hands out NFD file names while most other systems use NFC, so two
//! spellings of `café.mp3` compare equal through their keys even though
//! the identity paths themselves are left untouched.
//!
//! # Example
//!
//! ```
//! use audiodupe::scanner::PathNormalizer;
//! use std::path::{Path, PathBuf};
//!
//! let normalizer = PathNormalizer::default();
//! assert_eq!(
//!     normalizer.normalize(Path::new("/music/./rock/../pop/")),
//!     PathBuf::from("/music/pop")
//! );
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use unicode_normalization::UnicodeNormalization;

/// Resolves a mapped drive letter to the network share behind it.
pub trait NetworkResolver: Send + Sync {
    /// Return the remote name (e.g. `\\nas\music`) for a drive letter, if
    /// the drive is a mapped network drive.
    fn resolve_drive(&self, letter: char) -> Option<String>;
}

/// Resolver that never resolves anything. Default on non-Windows platforms.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNetworkResolver;

impl NetworkResolver for NoNetworkResolver {
    fn resolve_drive(&self, _letter: char) -> Option<String> {
        None
    }
}

/// Resolver backed by `WNetGetConnectionW`.
#[cfg(windows)]
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsNetworkResolver;

#[cfg(windows)]
impl NetworkResolver for WindowsNetworkResolver {
    fn resolve_drive(&self, letter: char) -> Option<String> {
        use winapi::shared::minwindef::DWORD;
        use winapi::shared::winerror::NO_ERROR;
        use winapi::um::winnetwk::WNetGetConnectionW;

        let local: Vec<u16> = format!("{letter}:").encode_utf16().chain(Some(0)).collect();
        let mut buffer = vec![0u16; 1024];
        let mut length = buffer.len() as DWORD;

        // SAFETY: `local` is NUL-terminated and `buffer` holds `length` u16s.
        let status =
            unsafe { WNetGetConnectionW(local.as_ptr(), buffer.as_mut_ptr(), &mut length) };
        if status != NO_ERROR {
            log::trace!("WNetGetConnectionW({letter}:) returned {status}");
            return None;
        }

        let end = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
        let remote = String::from_utf16_lossy(&buffer[..end]);
        (!remote.is_empty()).then_some(remote)
    }
}

/// The platform's default resolver.
#[must_use]
pub fn default_resolver() -> Arc<dyn NetworkResolver> {
    #[cfg(windows)]
    {
        Arc::new(WindowsNetworkResolver)
    }
    #[cfg(not(windows))]
    {
        Arc::new(NoNetworkResolver)
    }
}

/// Produces canonical path forms, memoizing results per instance.
pub struct PathNormalizer {
    resolver: Arc<dyn NetworkResolver>,
    memo: Mutex<HashMap<PathBuf, PathBuf>>,
}

impl Default for PathNormalizer {
    fn default() -> Self {
        Self::new(default_resolver())
    }
}

impl fmt::Debug for PathNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let memoized = self
            .memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("PathNormalizer")
            .field("memoized", &memoized)
            .finish_non_exhaustive()
    }
}

impl PathNormalizer {
    /// Create a normalizer using the given network resolver.
    #[must_use]
    pub fn new(resolver: Arc<dyn NetworkResolver>) -> Self {
        Self {
            resolver,
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// Return the canonical form of `path`.
    ///
    /// Idempotent: normalizing an already normalized path returns it
    /// unchanged.
    pub fn normalize(&self, path: &Path) -> PathBuf {
        if let Some(hit) = self
            .memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
        {
            return hit.clone();
        }

        let normalized = self.normalize_uncached(path);
        self.memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf(), normalized.clone());
        normalized
    }

    fn normalize_uncached(&self, path: &Path) -> PathBuf {
        let raw = path.to_string_lossy();

        if is_unc(&raw) {
            return PathBuf::from(unc_form(&raw));
        }

        if let Some(letter) = drive_letter(&raw) {
            if let Some(share) = self.resolver.resolve_drive(letter) {
                let rest = &raw[2..];
                log::debug!("Resolved mapped drive {letter}: to {share}");
                return PathBuf::from(unc_form(&format!("{share}\\{rest}")));
            }
        }

        lexical_normalize(path)
    }
}

fn is_unc(raw: &str) -> bool {
    raw.starts_with("\\\\") || raw.starts_with("//")
}

fn drive_letter(raw: &str) -> Option<char> {
    let bytes = raw.as_bytes();
    let has_drive = bytes.len() >= 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes.len() == 2 || bytes[2] == b'\\' || bytes[2] == b'/');
    has_drive.then(|| char::from(bytes[0]).to_ascii_uppercase())
}

/// Backslash form with exactly one leading `\\`. Server and share are
/// never folded away by `..`.
fn unc_form(raw: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split(['\\', '/']) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.len() > 2 {
                    segments.pop();
                }
            }
            other => segments.push(other),
        }
    }
    format!("\\\\{}", segments.join("\\"))
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }

    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().map(|c| c.as_os_str()).collect()
}

/// Normalize a path string to NFC (Composed) form.
#[must_use]
pub fn normalize_path_str(s: &str) -> String {
    s.nfc().collect()
}

/// Create a normalized comparison key for a path.
///
/// Used for HashMap/HashSet membership where Unicode normalization
/// differences should not matter. Invalid UTF-8 is converted lossily.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use std::collections::HashSet;
/// use audiodupe::scanner::path_utils::path_key;
///
/// let mut seen = HashSet::new();
/// seen.insert(path_key(Path::new("café.mp3")));
///
/// // NFD version of same path already in set
/// let nfd_path = Path::new("cafe\u{0301}.mp3");
/// assert!(seen.contains(&path_key(nfd_path)));
/// ```
#[must_use]
pub fn path_key(path: &Path) -> String {
    normalize_path_str(&path.to_string_lossy())
}
