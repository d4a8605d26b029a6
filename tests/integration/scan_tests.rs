use super::common::{file_names, normalized, scanner, write_file};
use audiodupe::index::IndexStore;
use audiodupe::scanner::ScanError;
use filetime::{set_file_mtime, FileTime};
use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::tempdir;

#[test]
fn test_scan_empty_directory() {
    let dir = tempdir().unwrap();
    let output = scanner(None).scan(dir.path(), 0, 0).unwrap();

    assert!(output.records.is_empty());
    assert_eq!(output.root, normalized(dir.path()));
}

#[test]
fn test_scan_keeps_only_audio_files() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "song.mp3", b"1");
    write_file(dir.path(), "LOUD.FLAC", b"2");
    write_file(dir.path(), "album/track.m4a", b"3");
    write_file(dir.path(), "album/cover.jpg", b"4");
    write_file(dir.path(), "notes.txt", b"5");
    write_file(dir.path(), "noext", b"6");

    let output = scanner(None).scan(dir.path(), 0, 0).unwrap();
    assert_eq!(
        file_names(output.records.into_iter().map(|r| r.path)),
        vec!["LOUD.FLAC", "track.m4a", "song.mp3"]
    );
}

#[test]
fn test_scan_records_are_absolute_and_sorted() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "b.mp3", b"b");
    write_file(dir.path(), "a/z.mp3", b"z");
    write_file(dir.path(), "a.mp3", b"a");

    let output = scanner(None).scan(dir.path(), 0, 0).unwrap();
    let paths: Vec<_> = output.records.iter().map(|r| r.path.clone()).collect();
    let mut sorted = paths.clone();
    sorted.sort();

    assert_eq!(paths, sorted);
    assert!(paths.iter().all(|p| p.is_absolute()));
    assert!(paths.iter().all(|p| p.starts_with(&output.root)));
}

#[test]
fn test_scan_min_size_and_max_depth() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "small.mp3", b"x");
    write_file(dir.path(), "big.mp3", &[0u8; 100]);
    write_file(dir.path(), "one/big.mp3", &[1u8; 100]);
    write_file(dir.path(), "one/two/big.mp3", &[2u8; 100]);

    let sized = scanner(None).scan(dir.path(), 0, 50).unwrap();
    assert_eq!(sized.records.len(), 3);

    let shallow = scanner(None).scan(dir.path(), 1, 50).unwrap();
    assert_eq!(shallow.records.len(), 2);
    assert!(shallow
        .records
        .iter()
        .all(|r| !r.path.strip_prefix(&shallow.root).unwrap().starts_with("one/two")));
}

#[test]
fn test_scan_missing_and_non_directory_roots() {
    let dir = tempdir().unwrap();
    let file = write_file(dir.path(), "a.mp3", b"a");

    let missing = scanner(None).scan(&dir.path().join("nope"), 0, 0).unwrap_err();
    assert!(matches!(missing, ScanError::PathNotFound(_)));

    let not_dir = scanner(None).scan(&file, 0, 0).unwrap_err();
    assert!(matches!(not_dir, ScanError::NotADirectory(_)));
}

#[test]
fn test_scan_dotted_root_is_normalized() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "album/a.mp3", b"a");
    let dotted = dir.path().join("album").join("..").join(".");

    let output = scanner(None).scan(&dotted, 0, 0).unwrap();
    assert_eq!(output.root, normalized(dir.path()));
    assert_eq!(output.records.len(), 1);
}

#[test]
fn test_rescan_skips_unchanged_subdirectories() {
    let music = tempdir().unwrap();
    let index = tempdir().unwrap();
    let store = IndexStore::new(index.path());
    write_file(music.path(), "Artist/Album/01.mp3", b"one");
    write_file(music.path(), "Artist/Album/02.mp3", b"two");

    let first = scanner(Some(&store)).scan(music.path(), 0, 0).unwrap();
    assert_eq!(first.records.len(), 2);
    assert!(first.stats.index_persisted);
    assert!(!first.stats.index_used);

    // Everything predates the snapshot except the root, which gains a file.
    let old = FileTime::from_system_time(SystemTime::now() - Duration::from_secs(3600));
    set_file_mtime(music.path().join("Artist"), old).unwrap();
    set_file_mtime(music.path().join("Artist/Album"), old).unwrap();
    write_file(music.path(), "new.mp3", b"new");
    let future = FileTime::from_system_time(SystemTime::now() + Duration::from_secs(60));
    set_file_mtime(music.path(), future).unwrap();

    let second = scanner(Some(&store)).scan(music.path(), 0, 0).unwrap();
    assert!(second.stats.index_used);
    assert_eq!(second.stats.cached_files, 2);
    assert_eq!(second.stats.new_files, 1);
    assert_eq!(second.stats.pruned_dirs, 1);
    assert_eq!(
        file_names(second.records.into_iter().map(|r| r.path)),
        vec!["01.mp3", "02.mp3", "new.mp3"]
    );
}

#[test]
fn test_rescan_with_nothing_new_does_not_rewrite_index() {
    let music = tempdir().unwrap();
    let index = tempdir().unwrap();
    let store = IndexStore::new(index.path());
    write_file(music.path(), "a.mp3", b"a");

    scanner(Some(&store)).scan(music.path(), 0, 0).unwrap();
    let second = scanner(Some(&store)).scan(music.path(), 0, 0).unwrap();

    assert!(second.stats.index_used);
    assert_eq!(second.stats.new_files, 0);
    assert!(!second.stats.index_persisted);
    assert_eq!(second.records.len(), 1);
}

#[test]
fn test_rescan_drops_deleted_file() {
    let music = tempdir().unwrap();
    let index = tempdir().unwrap();
    let store = IndexStore::new(index.path());
    write_file(music.path(), "a.mp3", b"a");
    let gone = write_file(music.path(), "b.mp3", b"b");

    scanner(Some(&store)).scan(music.path(), 0, 0).unwrap();
    fs::remove_file(gone).unwrap();

    let second = scanner(Some(&store)).scan(music.path(), 0, 0).unwrap();
    assert_eq!(second.stats.stale_entries, 1);
    assert_eq!(file_names(second.records.into_iter().map(|r| r.path)), vec!["a.mp3"]);
}

#[test]
fn test_scan_interrupted_by_shutdown_flag() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.mp3", b"a");

    let err = scanner(None)
        .with_shutdown_flag(Arc::new(AtomicBool::new(true)))
        .scan(dir.path(), 0, 0)
        .unwrap_err();
    assert!(matches!(err, ScanError::Interrupted));
}

#[cfg(unix)]
#[test]
fn test_scan_survives_symlink_cycle() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "album/a.mp3", b"a");
    std::os::unix::fs::symlink(dir.path(), dir.path().join("album/loop")).unwrap();

    let output = scanner(None)
        .with_follow_symlinks(true)
        .scan(dir.path(), 0, 0)
        .unwrap();
    assert_eq!(output.records.len(), 1);
}

#[test]
fn test_depth_limited_rescan_keeps_new_files_for_full_rescan() {
    let music = tempdir().unwrap();
    let index = tempdir().unwrap();
    let store = IndexStore::new(index.path());
    write_file(music.path(), "a.mp3", b"a");
    let old = write_file(music.path(), "old.mp3", b"o");

    let first = scanner(Some(&store)).scan(music.path(), 0, 0).unwrap();
    assert!(first.stats.index_persisted);

    // Age the snapshot so the root change below lands between it and now.
    let root = first.root;
    let path = store.index_path(&root);
    let mut doc: audiodupe::index::IndexDocument =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    doc.timestamp -= 120.0;
    fs::write(&path, serde_json::to_string(&doc).unwrap()).unwrap();

    fs::remove_file(old).unwrap();
    write_file(music.path(), "new.mp3", b"n");
    set_file_mtime(
        music.path(),
        FileTime::from_system_time(SystemTime::now() - Duration::from_secs(60)),
    )
    .unwrap();

    let shallow = scanner(Some(&store)).scan(music.path(), 1, 0).unwrap();
    assert_eq!(shallow.stats.stale_entries, 1);
    assert!(shallow.stats.index_persisted);
    assert_eq!(
        file_names(shallow.records.into_iter().map(|r| r.path)),
        vec!["a.mp3", "new.mp3"]
    );

    let full = scanner(Some(&store)).scan(music.path(), 0, 0).unwrap();
    assert_eq!(
        file_names(full.records.into_iter().map(|r| r.path)),
        vec!["a.mp3", "new.mp3"]
    );
}
