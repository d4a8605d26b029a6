//! Song identity heuristics for file names.
//!
//! # Overview
//!
//! Music libraries accumulate the same song under slightly different names:
//! `Song - Artist.mp3`, `Song - Artist (Live).flac`,
//! `Song - Artist feat. Someone_20240101120000.mp3`. The functions here
//! reduce such names to a `(title, artist)` pair so the filename strategy
//! can group them together.
//!
//! # Example
//!
//! ```
//! use audiodupe::duplicates::filename::{parse_music_filename, song_key};
//!
//! let (title, artist) = parse_music_filename("Hello - Adele (Live).mp3");
//! assert_eq!(title, "hello");
//! assert_eq!(artist, "adele");
//! assert_eq!(song_key(&title, &artist), "hello|adele");
//! ```

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

static TIMESTAMP_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_\d{14}$").expect("valid regex"));

static TITLE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\s*[(（]\s*(?:live|remix|cover|dj版|dj version|纯音乐|instrumental|伴奏|karaoke|片段|excerpt|demo)\s*[)）]\s*$",
    )
    .expect("valid regex")
});

static ARTIST_TRAILERS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)\s*\b(?:feat|ft)\..*$").expect("valid regex"),
        Regex::new(r"(?i)\s*\bcover\b.*$").expect("valid regex"),
        Regex::new(r"\s*翻自.*$").expect("valid regex"),
        Regex::new(r"\s*[(（][^()（）]*[)）]\s*$").expect("valid regex"),
    ]
});

static ARTIST_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[%.\s\-_]+").expect("valid regex"));

// Matched after separators collapsed, so `G.E.M.` reads `g e m`.
static ARTIST_VARIANT_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.*\S)\s*(?:g e m|邓紫棋|a mei|阿妹)$").expect("valid regex")
});

/// Split a file name into a normalized `(title, artist)` pair.
///
/// The extension and a trailing `_YYYYMMDDhhmmss` timestamp are removed,
/// then the name is split on the first `" - "`. Without a separator the
/// whole name is the title and the artist is empty. Both parts are
/// lowercased.
#[must_use]
pub fn parse_music_filename(file_name: &str) -> (String, String) {
    let stem = Path::new(file_name)
        .file_stem()
        .map_or_else(|| file_name.to_string(), |s| s.to_string_lossy().into_owned());
    let stem = TIMESTAMP_SUFFIX.replace(stem.trim(), "");

    match stem.split_once(" - ") {
        Some((title, artist)) => (strip_title_tags(title), normalize_artist_name(artist)),
        None => (strip_title_tags(&stem), String::new()),
    }
}

/// Remove trailing version markers such as `(Live)` or `（伴奏）` from a
/// title, repeatedly, then trim and lowercase it.
#[must_use]
pub fn strip_title_tags(title: &str) -> String {
    let mut current = title.trim().to_string();
    loop {
        let stripped = TITLE_TAG.replace(&current, "").trim().to_string();
        if stripped == current {
            return current.to_lowercase();
        }
        current = stripped;
    }
}

/// Reduce an artist credit to a comparable form.
///
/// Featuring credits, cover attributions and trailing parentheticals are
/// dropped, separator runs collapse into single spaces, and known alias
/// suffixes are removed when other text precedes them.
#[must_use]
pub fn normalize_artist_name(artist: &str) -> String {
    let mut current = artist.trim().to_string();
    loop {
        let before = current.clone();
        for pattern in ARTIST_TRAILERS.iter() {
            current = pattern.replace(&current, "").trim().to_string();
        }
        if current == before {
            break;
        }
    }

    let collapsed = ARTIST_SEPARATORS.replace_all(&current, " ");
    let collapsed = collapsed.trim();
    let stripped = ARTIST_VARIANT_SUFFIX.replace(collapsed, "$1");
    stripped.trim().to_lowercase()
}

/// Grouping key for a parsed name: `title|artist`, or the title alone.
#[must_use]
pub fn song_key(title: &str, artist: &str) -> String {
    if artist.is_empty() {
        title.to_string()
    } else {
        format!("{title}|{artist}")
    }
}
