use super::common::{file_names, write_file};
use audiodupe::duplicates::{DuplicateFinder, DuplicateGroup, Method, SearchRequest};
use audiodupe::resolution::{resolve, select_for_deletion, ResolutionSettings};
use filetime::{set_file_mtime, FileTime};
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::tempdir;

fn groups(root: &Path, method: Method) -> Vec<DuplicateGroup> {
    DuplicateFinder::with_defaults()
        .find_duplicates(&SearchRequest::new(root, method))
        .unwrap()
        .groups
}

fn selected_names(group: &DuplicateGroup, settings: &ResolutionSettings) -> Vec<String> {
    file_names(select_for_deletion(group, settings).into_iter().map(|r| r.path))
}

#[test]
fn test_all_but_one_copy_selected() {
    let dir = tempdir().unwrap();
    for name in ["a.mp3", "b.mp3", "c.mp3", "d.mp3"] {
        write_file(dir.path(), name, b"identical");
    }

    let found = groups(dir.path(), Method::Hash);
    assert_eq!(found.len(), 1);
    let resolution = resolve(&found[0], &ResolutionSettings::default());
    assert_eq!(resolution.delete.len(), 3);
    assert_eq!(resolution.keep.len(), 1);
}

#[test]
fn test_lossless_copy_is_kept() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "flac/Song - Artist.flac", &[1u8; 400]);
    write_file(dir.path(), "mp3/Song - Artist.mp3", &[2u8; 100]);
    write_file(dir.path(), "mp3/Song - Artist (Live).mp3", &[3u8; 120]);

    let found = groups(dir.path(), Method::Filename);
    assert_eq!(found.len(), 1);
    let resolution = resolve(&found[0], &ResolutionSettings::default());

    assert_eq!(
        file_names(resolution.keep.into_iter().map(|r| r.path)),
        vec!["Song - Artist.flac"]
    );
    assert_eq!(resolution.delete.len(), 2);
}

#[test]
fn test_custom_priority_overrides_format_order() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a/Song - Artist.flac", &[1u8; 400]);
    write_file(dir.path(), "b/Song - Artist.mp3", &[2u8; 100]);

    let found = groups(dir.path(), Method::Filename);
    let settings = ResolutionSettings {
        format_priority: BTreeMap::from([("mp3".to_string(), 1), (".FLAC".to_string(), 2)]),
        ..ResolutionSettings::default()
    };
    assert_eq!(selected_names(&found[0], &settings), vec!["Song - Artist.flac"]);
}

#[test]
fn test_excluded_directory_is_never_selected() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "archive/a.mp3", b"same");
    write_file(dir.path(), "archive/b.mp3", b"same");
    write_file(dir.path(), "inbox/c.mp3", b"same");

    let found = groups(dir.path(), Method::Mixed);
    let settings = ResolutionSettings {
        exclude_dirs: vec!["archive".into()],
        ..ResolutionSettings::default()
    };
    let resolution = resolve(&found[0], &settings);

    assert!(resolution.delete.is_empty());
    assert_eq!(resolution.keep.len(), 3);
}

#[test]
fn test_group_entirely_excluded_yields_nothing() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "keep/a.mp3", b"same");
    write_file(dir.path(), "keep/b.mp3", b"same");

    let found = groups(dir.path(), Method::Hash);
    let settings = ResolutionSettings {
        exclude_dirs: vec![dir.path().join("keep")],
        ..ResolutionSettings::default()
    };
    assert!(select_for_deletion(&found[0], &settings).is_empty());
}

#[test]
fn test_delete_dir_copies_go_first() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "library/song.mp3", &[9u8; 50]);
    write_file(dir.path(), "downloads/song.mp3", &[9u8; 50]);

    let found = groups(dir.path(), Method::Mixed);
    let settings = ResolutionSettings {
        delete_dirs: vec!["downloads".into()],
        ..ResolutionSettings::default()
    };
    let deleted = select_for_deletion(&found[0], &settings);
    assert_eq!(deleted.len(), 1);
    assert!(deleted[0].path.parent().unwrap().ends_with("downloads"));
}

#[test]
fn test_skip_different_names_only_ranks_matching_stems() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "x/track.mp3", b"same");
    write_file(dir.path(), "y/track.mp3", b"same");
    write_file(dir.path(), "z/other.mp3", b"same");

    let found = groups(dir.path(), Method::Hash);
    assert_eq!(found[0].len(), 3);

    let settings = ResolutionSettings {
        skip_different_names: true,
        ..ResolutionSettings::default()
    };
    assert_eq!(selected_names(&found[0], &settings), vec!["track.mp3"]);
    assert_eq!(selected_names(&found[0], &ResolutionSettings::default()).len(), 2);
}

#[test]
fn test_prefer_oldest_keeps_earliest_copy() {
    let dir = tempdir().unwrap();
    let old = write_file(dir.path(), "old.mp3", b"same");
    let new = write_file(dir.path(), "new.mp3", b"same");
    set_file_mtime(&old, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();
    set_file_mtime(&new, FileTime::from_unix_time(1_700_000_000, 0)).unwrap();

    let found = groups(dir.path(), Method::Mixed);
    assert_eq!(
        selected_names(&found[0], &ResolutionSettings::default()),
        vec!["old.mp3"]
    );

    let settings = ResolutionSettings {
        prefer_oldest: true,
        ..ResolutionSettings::default()
    };
    assert_eq!(selected_names(&found[0], &settings), vec!["new.mp3"]);
}
