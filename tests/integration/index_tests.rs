use super::common::{normalized, write_file};
use audiodupe::index::{IndexDocument, IndexStore};
use audiodupe::scanner::{FileMetadataCache, FileRecord};
use filetime::{set_file_mtime, FileTime};
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tempfile::tempdir;

fn snapshot(cache: &FileMetadataCache, paths: &[&Path]) -> Vec<FileRecord> {
    paths.iter().map(|p| cache.stat(p)).collect()
}

fn read_doc(store: &IndexStore, root: &Path) -> IndexDocument {
    let content = fs::read_to_string(store.index_path(root)).unwrap();
    serde_json::from_str(&content).unwrap()
}

fn write_doc(store: &IndexStore, root: &Path, doc: &IndexDocument) {
    fs::write(store.index_path(root), serde_json::to_string(doc).unwrap()).unwrap();
}

#[test]
fn test_save_then_load_returns_same_records() {
    let music = tempdir().unwrap();
    let index = tempdir().unwrap();
    let root = normalized(music.path());
    let a = write_file(&root, "a.mp3", b"aaaa");
    let b = write_file(&root, "album/b.flac", b"bbbbbbbb");

    let store = IndexStore::new(index.path());
    let cache = FileMetadataCache::new();
    let saved = snapshot(&cache, &[&a, &b]);
    assert!(store.save(&root, &saved));

    let loaded = store.load(&root, &FileMetadataCache::new()).unwrap();
    assert_eq!(loaded.dropped, 0);
    assert_eq!(loaded.records.len(), 2);
    for (before, after) in saved.iter().zip(&loaded.records) {
        assert_eq!(before.path, after.path);
        assert_eq!(before.size, after.size);
        let drift = before.mtime_secs() - after.mtime_secs();
        assert!(drift.abs() < 1e-3, "mtime drifted by {drift}");
    }
}

#[test]
fn test_index_older_than_a_day_is_a_miss() {
    let music = tempdir().unwrap();
    let index = tempdir().unwrap();
    let root = normalized(music.path());
    let a = write_file(&root, "a.mp3", b"a");

    let store = IndexStore::new(index.path());
    let cache = FileMetadataCache::new();
    assert!(store.save(&root, &snapshot(&cache, &[&a])));

    let mut doc = read_doc(&store, &root);
    doc.timestamp -= 25.0 * 3600.0;
    write_doc(&store, &root, &doc);
    assert!(store.load(&root, &cache).is_none());

    // Just inside the window is still valid.
    doc.timestamp += 2.0 * 3600.0;
    write_doc(&store, &root, &doc);
    assert!(store.load(&root, &cache).is_some());
}

#[test]
fn test_custom_max_age() {
    let music = tempdir().unwrap();
    let index = tempdir().unwrap();
    let root = normalized(music.path());
    let a = write_file(&root, "a.mp3", b"a");

    let store = IndexStore::new(index.path()).with_max_age(Duration::from_secs(60));
    let cache = FileMetadataCache::new();
    store.save(&root, &snapshot(&cache, &[&a]));

    let mut doc = read_doc(&store, &root);
    doc.timestamp -= 120.0;
    write_doc(&store, &root, &doc);
    assert!(store.load(&root, &cache).is_none());
}

#[test]
fn test_deleted_file_is_dropped_and_index_compacted() {
    let music = tempdir().unwrap();
    let index = tempdir().unwrap();
    let root = normalized(music.path());
    let keep = write_file(&root, "keep.mp3", b"keep");
    let gone = write_file(&root, "gone.mp3", b"gone");

    let store = IndexStore::new(index.path());
    let cache = FileMetadataCache::new();
    assert!(store.save(&root, &snapshot(&cache, &[&keep, &gone])));

    fs::remove_file(&gone).unwrap();
    let loaded = store.load(&root, &FileMetadataCache::new()).unwrap();
    assert_eq!(loaded.dropped, 1);
    assert_eq!(loaded.records.len(), 1);
    assert_eq!(loaded.records[0].path, keep);

    let doc = read_doc(&store, &root);
    assert_eq!(doc.files.len(), 1);
    assert_eq!(doc.files[0].path, keep.to_string_lossy());
}

#[test]
fn test_mtime_drift_within_a_second_is_tolerated() {
    let music = tempdir().unwrap();
    let index = tempdir().unwrap();
    let root = normalized(music.path());
    let a = write_file(&root, "a.mp3", b"a");
    let b = write_file(&root, "b.mp3", b"b");
    let base = FileTime::from_unix_time(1_700_000_000, 0);
    set_file_mtime(&a, base).unwrap();
    set_file_mtime(&b, base).unwrap();

    let store = IndexStore::new(index.path());
    store.save(&root, &snapshot(&FileMetadataCache::new(), &[&a, &b]));

    set_file_mtime(&a, FileTime::from_unix_time(1_700_000_000, 500_000_000)).unwrap();
    set_file_mtime(&b, FileTime::from_unix_time(1_700_000_005, 0)).unwrap();

    let loaded = store.load(&root, &FileMetadataCache::new()).unwrap();
    assert_eq!(loaded.dropped, 1);
    assert_eq!(loaded.records.len(), 1);
    assert_eq!(loaded.records[0].path, a);
}

#[test]
fn test_size_change_drops_entry() {
    let music = tempdir().unwrap();
    let index = tempdir().unwrap();
    let root = normalized(music.path());
    let a = write_file(&root, "a.mp3", b"short");
    let b = write_file(&root, "b.mp3", b"b");

    let store = IndexStore::new(index.path());
    store.save(&root, &snapshot(&FileMetadataCache::new(), &[&a, &b]));

    let mtime = FileTime::from_last_modification_time(&fs::metadata(&a).unwrap());
    fs::write(&a, b"much longer now").unwrap();
    set_file_mtime(&a, mtime).unwrap();

    let loaded = store.load(&root, &FileMetadataCache::new()).unwrap();
    assert_eq!(loaded.dropped, 1);
    assert_eq!(loaded.records[0].path, b);
}

#[test]
fn test_corrupt_index_is_quarantined() {
    let music = tempdir().unwrap();
    let index = tempdir().unwrap();
    let root = normalized(music.path());
    let store = IndexStore::new(index.path());

    fs::write(store.index_path(&root), b"{ not json").unwrap();
    assert!(store.load(&root, &FileMetadataCache::new()).is_none());

    assert!(!store.index_path(&root).exists());
    let quarantined = fs::read_dir(index.path())
        .unwrap()
        .filter_map(Result::ok)
        .any(|e| e.file_name().to_string_lossy().contains(".corrupt-"));
    assert!(quarantined);
}

#[test]
fn test_out_of_range_timestamp_is_quarantined() {
    let music = tempdir().unwrap();
    let index = tempdir().unwrap();
    let root = normalized(music.path());
    let a = write_file(&root, "a.mp3", b"a");

    let store = IndexStore::new(index.path());
    fs::create_dir_all(index.path()).unwrap();
    let json = serde_json::json!({
        "root_dir": root.to_string_lossy(),
        "timestamp": 1e20,
        "files": [{ "path": a.to_string_lossy(), "size": 1, "mtime": 0.0 }],
    });
    fs::write(store.index_path(&root), json.to_string()).unwrap();

    assert!(store.load(&root, &FileMetadataCache::new()).is_none());
    assert!(!store.index_path(&root).exists());
    let quarantined = fs::read_dir(index.path())
        .unwrap()
        .filter_map(Result::ok)
        .any(|e| e.file_name().to_string_lossy().contains(".corrupt-"));
    assert!(quarantined);
}

#[test]
fn test_future_timestamp_is_not_trusted() {
    let music = tempdir().unwrap();
    let index = tempdir().unwrap();
    let root = normalized(music.path());
    let a = write_file(&root, "a.mp3", b"a");

    let store = IndexStore::new(index.path());
    let cache = FileMetadataCache::new();
    assert!(store.save(&root, &snapshot(&cache, &[&a])));

    let mut doc = read_doc(&store, &root);
    doc.timestamp += 365.0 * 24.0 * 3600.0;
    write_doc(&store, &root, &doc);

    assert!(store.load(&root, &cache).is_none());
    assert!(!store.index_path(&root).exists());
}

#[test]
fn test_compaction_keeps_original_timestamp() {
    let music = tempdir().unwrap();
    let index = tempdir().unwrap();
    let root = normalized(music.path());
    let keep = write_file(&root, "keep.mp3", b"keep");
    let gone = write_file(&root, "gone.mp3", b"gone");

    let store = IndexStore::new(index.path());
    assert!(store.save(&root, &snapshot(&FileMetadataCache::new(), &[&keep, &gone])));
    let mut doc = read_doc(&store, &root);
    doc.timestamp -= 3600.0;
    write_doc(&store, &root, &doc);

    fs::remove_file(&gone).unwrap();
    assert_eq!(store.load(&root, &FileMetadataCache::new()).unwrap().dropped, 1);

    let compacted = read_doc(&store, &root);
    assert_eq!(compacted.files.len(), 1);
    assert!((compacted.timestamp - doc.timestamp).abs() < 1e-6);
}

#[test]
fn test_index_for_other_root_is_a_miss() {
    let music = tempdir().unwrap();
    let index = tempdir().unwrap();
    let root = normalized(music.path());
    let a = write_file(&root, "a.mp3", b"a");

    let store = IndexStore::new(index.path());
    store.save(&root, &snapshot(&FileMetadataCache::new(), &[&a]));

    let mut doc = read_doc(&store, &root);
    doc.root_dir = "/somewhere/else".to_string();
    write_doc(&store, &root, &doc);
    assert!(store.load(&root, &FileMetadataCache::new()).is_none());
}

#[test]
fn test_entries_without_exists_flag_default_to_true() {
    let music = tempdir().unwrap();
    let index = tempdir().unwrap();
    let root = normalized(music.path());
    let a = write_file(&root, "a.mp3", b"abc");
    let mtime = fs::metadata(&a)
        .unwrap()
        .modified()
        .unwrap()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs_f64();
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs_f64();

    let store = IndexStore::new(index.path());
    fs::create_dir_all(index.path()).unwrap();
    let json = serde_json::json!({
        "root_dir": root.to_string_lossy(),
        "timestamp": now,
        "files": [{ "path": a.to_string_lossy(), "size": 3, "mtime": mtime }],
    });
    fs::write(store.index_path(&root), json.to_string()).unwrap();

    let loaded = store.load(&root, &FileMetadataCache::new()).unwrap();
    assert!(loaded.records[0].exists);
}

#[test]
fn test_remove_index() {
    let music = tempdir().unwrap();
    let index = tempdir().unwrap();
    let root = normalized(music.path());
    let a = write_file(&root, "a.mp3", b"a");

    let store = IndexStore::new(index.path());
    store.save(&root, &snapshot(&FileMetadataCache::new(), &[&a]));
    assert!(store.remove(&root).unwrap());
    assert!(!store.remove(&root).unwrap());
    assert!(store.load(&root, &FileMetadataCache::new()).is_none());
}
