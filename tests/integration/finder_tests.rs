use super::common::{file_names, write_file};
use audiodupe::duplicates::{
    DuplicateFinder, FinderConfig, FinderError, Method, SearchEvent, SearchRequest,
};
use audiodupe::index::IndexStore;
use audiodupe::progress::ProgressCallback;
use audiodupe::scanner::{ContentHash, FileMetadataCache};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

const TWO_MB: usize = 2 * 1024 * 1024;

fn search(root: &std::path::Path, method: Method) -> audiodupe::duplicates::SearchOutcome {
    DuplicateFinder::with_defaults()
        .find_duplicates(&SearchRequest::new(root, method))
        .unwrap()
}

#[test]
fn test_identical_pair_by_each_method() {
    let dir = tempdir().unwrap();
    let content = vec![7u8; TWO_MB];
    write_file(dir.path(), "a.mp3", &content);
    write_file(dir.path(), "b.mp3", &content);

    for method in [Method::Size, Method::Hash, Method::Mixed] {
        let outcome = search(dir.path(), method);
        assert_eq!(outcome.total_files, 2, "{method}");
        assert_eq!(outcome.groups.len(), 1, "{method}");
        assert_eq!(
            file_names(outcome.groups[0].paths()),
            vec!["a.mp3", "b.mp3"],
            "{method}"
        );
    }

    let by_name = search(dir.path(), Method::Filename);
    assert_eq!(by_name.total_files, 2);
    assert!(by_name.groups.is_empty());
}

#[test]
fn test_same_size_different_content() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.mp3", b"aaaa");
    write_file(dir.path(), "b.mp3", b"bbbb");

    assert_eq!(search(dir.path(), Method::Size).groups.len(), 1);
    assert!(search(dir.path(), Method::Hash).groups.is_empty());
    assert!(search(dir.path(), Method::Mixed).groups.is_empty());
}

#[test]
fn test_hash_groups_carry_hashes() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "x/a.flac", b"same bytes");
    write_file(dir.path(), "y/b.mp3", b"same bytes");

    let outcome = search(dir.path(), Method::Hash);
    let group = &outcome.groups[0];
    let expected = blake3::hash(b"same bytes").to_hex().to_string();

    assert_eq!(group.key, expected);
    assert!(group.label.starts_with("Hash: "));
    assert!(group
        .files
        .iter()
        .all(|f| f.hash == Some(ContentHash::Known(*blake3::hash(b"same bytes").as_bytes()))));
}

#[test]
fn test_live_version_groups_with_studio_version() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "Song - Artist.mp3", b"studio");
    write_file(dir.path(), "Song - Artist (Live).mp3", b"live recording");
    write_file(dir.path(), "Other - Artist.mp3", b"other");

    let outcome = search(dir.path(), Method::Filename);
    assert_eq!(outcome.groups.len(), 1);
    let group = &outcome.groups[0];
    assert_eq!(group.key, "song|artist");
    assert_eq!(group.len(), 2);
    assert!(group.label.contains("song"));
}

#[test]
fn test_filename_ignores_extension_and_case() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a/Hello - Adele.flac", b"lossless");
    write_file(dir.path(), "b/hello - ADELE.mp3", b"lossy");

    let outcome = search(dir.path(), Method::Filename);
    assert_eq!(outcome.groups.len(), 1);
    assert_eq!(outcome.groups[0].len(), 2);
}

#[test]
fn test_min_size_excludes_small_files() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.mp3", b"tiny");
    write_file(dir.path(), "b.mp3", b"tiny");

    let finder = DuplicateFinder::with_defaults();
    let outcome = finder
        .find_duplicates(&SearchRequest::new(dir.path(), Method::Size).with_min_size(100))
        .unwrap();
    assert_eq!(outcome.total_files, 0);
    assert!(outcome.groups.is_empty());
}

#[test]
fn test_search_with_index_reports_stats() {
    let dir = tempdir().unwrap();
    let index = tempdir().unwrap();
    write_file(dir.path(), "a.mp3", b"same");
    write_file(dir.path(), "b.mp3", b"same");

    let finder =
        DuplicateFinder::new(FinderConfig::default().with_index(IndexStore::new(index.path())));
    let request = SearchRequest::new(dir.path(), Method::Mixed);

    let first = finder.find_duplicates(&request).unwrap();
    assert!(first.stats.index_persisted);

    let second = finder.find_duplicates(&request).unwrap();
    assert!(second.stats.index_used);
    assert_eq!(second.stats.cached_files, 2);
    assert_eq!(second.groups.len(), 1);
    assert_eq!(second.groups[0].paths(), first.groups[0].paths());
    assert_eq!(second.groups[0].key, first.groups[0].key);
}

#[test]
fn test_shared_cache_avoids_rehashing() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.mp3", b"same");
    write_file(dir.path(), "b.mp3", b"same");

    let cache = Arc::new(FileMetadataCache::new());
    let finder =
        DuplicateFinder::new(FinderConfig::default().with_metadata_cache(Arc::clone(&cache)));
    let request = SearchRequest::new(dir.path(), Method::Hash);

    finder.find_duplicates(&request).unwrap();
    finder.find_duplicates(&request).unwrap();
    assert_eq!(cache.hashes_computed(), 2);
}

#[test]
fn test_interrupted_search() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.mp3", b"a");

    let finder = DuplicateFinder::new(
        FinderConfig::default().with_shutdown_flag(Arc::new(AtomicBool::new(true))),
    );
    let err = finder
        .find_duplicates(&SearchRequest::new(dir.path(), Method::Hash))
        .unwrap_err();
    assert!(matches!(err, FinderError::Interrupted));
}

#[derive(Default)]
struct Collect {
    percents: Mutex<Vec<u8>>,
}

impl ProgressCallback for Collect {
    fn on_progress(&self, _message: &str, percent: u8) {
        self.percents.lock().unwrap().push(percent);
    }
}

#[test]
fn test_background_search_events() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.mp3", b"same");
    write_file(dir.path(), "b.mp3", b"same");

    let callback = Arc::new(Collect::default());
    let finder = Arc::new(DuplicateFinder::new(
        FinderConfig::default().with_progress_callback(callback.clone()),
    ));
    let handle = finder
        .spawn(SearchRequest::new(dir.path(), Method::Mixed))
        .unwrap();

    let mut progress = Vec::new();
    let mut finished = None;
    while let Some(event) = handle.next_event() {
        match event {
            SearchEvent::Progress { percent, .. } => progress.push(percent),
            SearchEvent::Error(message) => panic!("unexpected error: {message}"),
            SearchEvent::Finished(result) => finished = Some(result),
        }
    }

    let outcome = finished.expect("finished event").unwrap();
    assert_eq!(outcome.groups.len(), 1);
    assert_eq!(progress.first(), Some(&0));
    assert_eq!(progress.last(), Some(&100));
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    // The configured callback sees the same checkpoints.
    assert_eq!(*callback.percents.lock().unwrap(), progress);
}

#[test]
fn test_background_search_wait() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.mp3", b"same");
    write_file(dir.path(), "b.mp3", b"same");

    let finder = Arc::new(DuplicateFinder::with_defaults());
    let outcome = finder
        .spawn(SearchRequest::new(dir.path(), Method::Size))
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(outcome.groups.len(), 1);
}

/// Fails the first time hashing progress is reported.
struct FailWhileHashing;

impl ProgressCallback for FailWhileHashing {
    fn on_progress(&self, message: &str, _percent: u8) {
        if message.starts_with("Hashing") {
            panic!("display went away");
        }
    }
}

#[test]
fn test_panicking_callback_is_reported_as_classification_error() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.mp3", b"identical");
    write_file(dir.path(), "b.mp3", b"identical");
    write_file(dir.path(), "c.mp3", b"different content");

    let finder = DuplicateFinder::new(
        FinderConfig::default().with_progress_callback(Arc::new(FailWhileHashing)),
    );
    let outcome = finder
        .find_duplicates(&SearchRequest::new(dir.path(), Method::Hash))
        .unwrap();

    assert!(outcome.groups.is_empty());
    assert_eq!(outcome.total_files, 3);
    let error = outcome.error.expect("classification error");
    assert!(error.contains("display went away"), "{error}");
}

#[test]
fn test_background_search_reports_worker_panic() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.mp3", b"same");
    write_file(dir.path(), "b.mp3", b"same");

    let finder = Arc::new(DuplicateFinder::new(
        FinderConfig::default().with_progress_callback(Arc::new(FailWhileHashing)),
    ));
    let handle = finder
        .spawn(SearchRequest::new(dir.path(), Method::Mixed))
        .unwrap();

    let mut errors = Vec::new();
    let mut finished = None;
    while let Some(event) = handle.next_event() {
        match event {
            SearchEvent::Progress { .. } => {}
            SearchEvent::Error(message) => errors.push(message),
            SearchEvent::Finished(result) => finished = Some(result),
        }
    }

    assert_eq!(errors.len(), 1);
    let outcome = finished.expect("finished event").unwrap();
    assert!(outcome.groups.is_empty());
    assert_eq!(outcome.error.as_deref(), Some(errors[0].as_str()));
}
