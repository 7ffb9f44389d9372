use std::fs;
use std::path::Path;

use dx_sanitizer::store::{
    Artifact, ArtifactKey, ArtifactStore, FsArtifactStore, KeyPrefix, MemoryArtifactStore,
    SliceArtifact, Stage, StoreError,
};
use dx_sanitizer::types::{ContentDigest, Epsilon};
use tempfile::tempdir;

fn merged_ids(rows: Vec<Vec<u32>>) -> Artifact {
    Artifact::Ids {
        source: ContentDigest::from_bytes(b"run"),
        rows,
    }
}

fn eps(value: f64) -> Epsilon {
    Epsilon::new(value).unwrap()
}

fn slice_artifact(part_index: u32, first_row: usize) -> Artifact {
    Artifact::Slice(SliceArtifact {
        part_index,
        first_row,
        input_digest: ContentDigest::from_bytes(b"input"),
        ids: vec![vec![2, 3], vec![4, 0]],
    })
}

fn exercise_store(store: &dyn ArtifactStore) {
    let key = ArtifactKey::slice(Stage::Ids, eps(5.0), 0);
    let artifact = slice_artifact(0, 0);

    assert!(!store.contains(&key).unwrap());
    store.put(&key, &artifact).unwrap();
    assert!(store.contains(&key).unwrap());
    assert_eq!(store.get(&key).unwrap(), artifact);

    let merged = ArtifactKey::merged(Stage::Ids, eps(5.0));
    store.put(&merged, &merged_ids(vec![vec![1]])).unwrap();
    let other_epsilon = ArtifactKey::slice(Stage::Ids, eps(10.0), 0);
    store.put(&other_epsilon, &slice_artifact(0, 0)).unwrap();

    let mut listed = store.list(&KeyPrefix::new(Stage::Ids, eps(5.0))).unwrap();
    listed.sort();
    assert_eq!(listed, vec![key, merged]);

    store.delete(&key).unwrap();
    assert!(!store.contains(&key).unwrap());
    assert!(matches!(store.get(&key), Err(StoreError::NotFound(_))));

    // deleting twice is fine
    store.delete(&key).unwrap();
}

#[test]
fn fs_store_put_get_list_delete() {
    let dir = tempdir().unwrap();
    let store = FsArtifactStore::open(dir.path().join("artifacts")).unwrap();
    exercise_store(&store);
}

#[test]
fn memory_store_put_get_list_delete() {
    let store = MemoryArtifactStore::new();
    exercise_store(&store);
    assert_eq!(store.len(), 2);
}

#[test]
fn fs_store_layout_follows_key_scheme() {
    let dir = tempdir().unwrap();
    let store = FsArtifactStore::open(dir.path()).unwrap();

    store
        .put(&ArtifactKey::slice(Stage::Ids, eps(5.0), 3), &slice_artifact(3, 6))
        .unwrap();
    store
        .put(
            &ArtifactKey::merged(Stage::Text, eps(0.5)),
            &Artifact::Texts { texts: vec!["a".into()] },
        )
        .unwrap();
    store
        .put(
            &ArtifactKey::shared(Stage::Mask),
            &Artifact::Mask {
                source: ContentDigest::from_bytes(b"run"),
                rows: vec![vec![true]],
            },
        )
        .unwrap();

    assert!(dir.path().join("ids/epsi5/part_0003.json").is_file());
    assert!(dir.path().join("text/epsi0.5/full.json").is_file());
    assert!(dir.path().join("mask/shared/full.json").is_file());
}

#[test]
fn fs_store_list_ignores_temp_and_foreign_files() {
    let dir = tempdir().unwrap();
    let store = FsArtifactStore::open(dir.path()).unwrap();
    let key = ArtifactKey::slice(Stage::Ids, eps(1.0), 0);
    store.put(&key, &slice_artifact(0, 0)).unwrap();

    let part_dir = dir.path().join("ids/epsi1");
    fs::write(part_dir.join("part_0001.json.tmp"), b"{").unwrap();
    fs::write(part_dir.join("notes.txt"), b"hello").unwrap();

    let listed = store.list(&KeyPrefix::new(Stage::Ids, eps(1.0))).unwrap();
    assert_eq!(listed, vec![key]);
}

#[test]
fn fs_store_list_of_unknown_prefix_is_empty() {
    let dir = tempdir().unwrap();
    let store = FsArtifactStore::open(dir.path()).unwrap();
    assert!(store
        .list(&KeyPrefix::new(Stage::Ids, eps(42.0)))
        .unwrap()
        .is_empty());
}

fn tamper(path: &Path, from: &str, to: &str) {
    let contents = fs::read_to_string(path).unwrap();
    assert!(contents.contains(from), "fixture does not contain {from}");
    fs::write(path, contents.replacen(from, to, 1)).unwrap();
}

#[test]
fn corrupted_payload_is_detected_on_read() {
    let dir = tempdir().unwrap();
    let store = FsArtifactStore::open(dir.path()).unwrap();
    let key = ArtifactKey::merged(Stage::Ids, eps(1.0));
    store
        .put(&key, &merged_ids(vec![vec![7, 8, 9]]))
        .unwrap();

    tamper(&store.path_of(&key), "[7,8,9]", "[7,8,6]");

    match store.get(&key) {
        Err(StoreError::Corrupt { reason, .. }) => assert!(reason.contains("checksum mismatch")),
        other => panic!("expected corruption error, got {other:?}"),
    }
}

#[test]
fn envelope_for_another_key_is_rejected() {
    let dir = tempdir().unwrap();
    let store = FsArtifactStore::open(dir.path()).unwrap();
    let a = ArtifactKey::slice(Stage::Ids, eps(1.0), 0);
    let b = ArtifactKey::slice(Stage::Ids, eps(1.0), 1);
    store.put(&a, &slice_artifact(0, 0)).unwrap();

    fs::copy(store.path_of(&a), store.path_of(&b)).unwrap();

    assert!(matches!(store.get(&b), Err(StoreError::Corrupt { .. })));
}

#[test]
fn truncated_file_is_corrupt_not_transient() {
    let dir = tempdir().unwrap();
    let store = FsArtifactStore::open(dir.path()).unwrap();
    let key = ArtifactKey::merged(Stage::Ids, eps(1.0));
    store.put(&key, &merged_ids(vec![vec![1]])).unwrap();

    fs::write(store.path_of(&key), b"{\"key\":").unwrap();

    let err = store.get(&key).unwrap_err();
    assert!(matches!(err, StoreError::Corrupt { .. }));
    assert!(!err.is_transient());
}

#[test]
fn put_overwrites_atomically() {
    let dir = tempdir().unwrap();
    let store = FsArtifactStore::open(dir.path()).unwrap();
    let key = ArtifactKey::merged(Stage::Text, eps(2.0));

    store.put(&key, &Artifact::Texts { texts: vec!["old".into()] }).unwrap();
    store.put(&key, &Artifact::Texts { texts: vec!["new".into()] }).unwrap();

    assert_eq!(
        store.get(&key).unwrap(),
        Artifact::Texts { texts: vec!["new".into()] }
    );
    let leftovers: Vec<_> = fs::read_dir(dir.path().join("text/epsi2"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(leftovers.len(), 1, "temp file left behind: {leftovers:?}");
}

#[test]
fn contains_reports_stat_failures_instead_of_absence() {
    let dir = tempdir().unwrap();
    let store = FsArtifactStore::open(dir.path()).unwrap();
    // a plain file where the stage directory should be: stat fails with ENOTDIR
    fs::write(dir.path().join("ids"), b"not a directory").unwrap();

    let key = ArtifactKey::merged(Stage::Ids, eps(1.0));
    match store.contains(&key) {
        Err(StoreError::Io(e)) => assert_ne!(e.kind(), std::io::ErrorKind::NotFound),
        other => panic!("expected an IO error, got {other:?}"),
    }
}

#[test]
fn put_into_fresh_directory_is_visible_after_reopen() {
    let dir = tempdir().unwrap();
    let key = ArtifactKey::slice(Stage::Ids, eps(0.5), 12);
    FsArtifactStore::open(dir.path())
        .unwrap()
        .put(&key, &slice_artifact(12, 24))
        .unwrap();

    let reopened = FsArtifactStore::open(dir.path()).unwrap();
    assert_eq!(reopened.get(&key).unwrap(), slice_artifact(12, 24));
    assert_eq!(
        reopened.list(&KeyPrefix::new(Stage::Ids, eps(0.5))).unwrap(),
        vec![key]
    );
}
