use datatrace::core::catalog::{Catalog, DatasetKind};
use datatrace::core::config::Config;
use datatrace::core::error::{DatatraceError, ErrorKind};
use datatrace::core::hasher::ContentHasher;
use datatrace::plugins::versions::VersionStore;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};

fn open_store() -> (TempDir, Catalog) {
    let tmp = tempdir().unwrap();
    let catalog = Catalog::open(Config::with_root(tmp.path().join("datastore"))).unwrap();
    (tmp, catalog)
}

fn write_csv(path: &Path, rows: usize, cols: usize) {
    let mut out = String::new();
    let header: Vec<String> = (0..cols).map(|c| format!("col{}", c)).collect();
    out.push_str(&header.join(","));
    out.push('\n');
    for r in 0..rows {
        let row: Vec<String> = (0..cols).map(|c| (r * cols + c).to_string()).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    fs::write(path, out).unwrap();
}

fn object_entries(catalog: &Catalog) -> Vec<PathBuf> {
    fs::read_dir(catalog.objects_dir())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect()
}

#[test]
fn test_add_twice_is_idempotent() {
    let (tmp, catalog) = open_store();
    let src = tmp.path().join("train.csv");
    write_csv(&src, 5, 3);

    let store = VersionStore::new(&catalog);
    let v1 = store.add(&src, None).unwrap();
    let v2 = store.add(&src, None).unwrap();

    assert_eq!(v1, v2);
    assert_eq!(v1.len(), 8);
    assert_eq!(store.list().unwrap().len(), 1);
    assert_eq!(object_entries(&catalog).len(), 1);
}

#[test]
fn test_identical_content_from_another_path_dedups() {
    let (tmp, catalog) = open_store();
    let a = tmp.path().join("a.csv");
    let b = tmp.path().join("copy_of_a.csv");
    write_csv(&a, 3, 2);
    fs::copy(&a, &b).unwrap();

    let store = VersionStore::new(&catalog);
    assert_eq!(store.add(&a, None).unwrap(), store.add(&b, None).unwrap());
    let datasets = store.list().unwrap();
    assert_eq!(datasets.len(), 1);
    assert!(datasets[0].source_path.ends_with("a.csv"));
}

#[test]
fn test_stored_copy_hashes_back_to_content_hash() {
    let (tmp, catalog) = open_store();
    let file = tmp.path().join("labels.tsv");
    fs::write(&file, "id\tlabel\n1\tcat\n2\tdog\n").unwrap();
    let dir = tmp.path().join("images");
    fs::create_dir_all(dir.join("train")).unwrap();
    fs::write(dir.join("train/0.bin"), [0u8, 1, 2]).unwrap();
    fs::write(dir.join("readme.txt"), "imgs").unwrap();

    let store = VersionStore::new(&catalog);
    let hasher = ContentHasher::default();
    for src in [&file, &dir] {
        let vid = store.add(src, None).unwrap();
        let d = store.get(&vid).unwrap();
        let stored = Path::new(&d.stored_path);
        let digest = match d.kind {
            DatasetKind::File => hasher.hash_file(stored).unwrap(),
            DatasetKind::Directory => hasher.hash_tree(stored).unwrap(),
        };
        assert_eq!(digest, d.content_hash);
        assert!(d.content_hash.starts_with(&vid));
    }
}

#[test]
fn test_tabular_file_statistics() {
    let (tmp, catalog) = open_store();
    let src = tmp.path().join("data.csv");
    write_csv(&src, 100, 4);

    let store = VersionStore::new(&catalog);
    let vid = store.add(&src, None).unwrap();
    let d = store.get(&vid).unwrap();
    assert_eq!(d.kind, DatasetKind::File);
    assert_eq!(d.row_count, 100);
    assert_eq!(d.column_count, 4);
}

#[test]
fn test_directory_and_non_tabular_datasets_have_zero_statistics() {
    let (tmp, catalog) = open_store();
    let dir = tmp.path().join("shards");
    fs::create_dir_all(&dir).unwrap();
    write_csv(&dir.join("part-0.csv"), 10, 2);
    let blob = tmp.path().join("weights.bin");
    fs::write(&blob, [9u8; 64]).unwrap();

    let store = VersionStore::new(&catalog);
    for src in [&dir, &blob] {
        let d = store.get(&store.add(src, None).unwrap()).unwrap();
        assert_eq!((d.row_count, d.column_count), (0, 0));
    }
}

#[test]
fn test_missing_source_is_not_found_and_writes_nothing() {
    let (tmp, catalog) = open_store();
    let err = VersionStore::new(&catalog)
        .add(&tmp.path().join("nope.csv"), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(catalog.list_datasets().unwrap().is_empty());
    assert!(object_entries(&catalog).is_empty());
}

#[test]
fn test_metadata_is_persisted() {
    let (tmp, catalog) = open_store();
    let src = tmp.path().join("d.csv");
    write_csv(&src, 1, 1);

    let mut meta = BTreeMap::new();
    meta.insert("note".to_string(), "baseline split".to_string());
    let store = VersionStore::new(&catalog);
    let vid = store.add(&src, Some(meta.clone())).unwrap();
    assert_eq!(store.get(&vid).unwrap().metadata, meta);
}

#[test]
fn test_list_is_most_recent_first() {
    let (tmp, catalog) = open_store();
    let store = VersionStore::new(&catalog);
    let mut added = Vec::new();
    for i in 0..3 {
        let src = tmp.path().join(format!("d{}.csv", i));
        write_csv(&src, i + 1, 2);
        added.push(store.add(&src, None).unwrap());
    }
    let listed: Vec<String> = store.list().unwrap().into_iter().map(|d| d.version_id).collect();
    added.reverse();
    assert_eq!(listed, added);
}

#[test]
fn test_directory_hash_ignores_creation_order() {
    let (tmp, catalog) = open_store();
    let a = tmp.path().join("a");
    let b = tmp.path().join("b");
    let files = [("x/1.csv", "1"), ("y.csv", "2"), ("x/0.csv", "3"), ("z/q/r.csv", "4")];
    for (rel, body) in files.iter() {
        let p = a.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, body).unwrap();
    }
    for (rel, body) in files.iter().rev() {
        let p = b.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, body).unwrap();
    }

    let store = VersionStore::new(&catalog);
    assert_eq!(store.add(&a, None).unwrap(), store.add(&b, None).unwrap());
    assert_eq!(store.list().unwrap().len(), 1);
}

#[test]
fn test_verify_reports_tampered_and_missing_content() {
    let (tmp, catalog) = open_store();
    let f1 = tmp.path().join("one.csv");
    let f2 = tmp.path().join("two.csv");
    write_csv(&f1, 2, 2);
    write_csv(&f2, 3, 2);

    let store = VersionStore::new(&catalog);
    let v1 = store.add(&f1, None).unwrap();
    let v2 = store.add(&f2, None).unwrap();
    assert!(store.verify().unwrap().is_clean());

    fs::write(&store.get(&v1).unwrap().stored_path, "tampered").unwrap();
    fs::remove_file(&store.get(&v2).unwrap().stored_path).unwrap();

    let report = store.verify().unwrap();
    assert_eq!(report.checked, 2);
    assert_eq!(report.failures.len(), 2);
    assert!(report.failures.iter().any(|f| f.contains(&v1) && f.contains("mismatch")));
    assert!(report.failures.iter().any(|f| f.contains(&v2) && f.contains("missing")));
}

#[test]
fn test_get_with_malformed_reference_is_invalid_argument() {
    let (_tmp, catalog) = open_store();
    let err = VersionStore::new(&catalog).get("v1.0").unwrap_err();
    assert!(matches!(err, DatatraceError::InvalidArgument(_)));
}

#[test]
fn test_empty_directory_and_empty_file_are_distinct_datasets() {
    let (tmp, catalog) = open_store();
    let file = tmp.path().join("empty.csv");
    let dir = tmp.path().join("empty_dir");
    fs::write(&file, "").unwrap();
    fs::create_dir_all(&dir).unwrap();

    let store = VersionStore::new(&catalog);
    let file_vid = store.add(&file, None).unwrap();
    let dir_vid = store.add(&dir, None).unwrap();

    assert_ne!(file_vid, dir_vid);
    assert_eq!(store.get(&file_vid).unwrap().kind, DatasetKind::File);
    assert_eq!(store.get(&dir_vid).unwrap().kind, DatasetKind::Directory);
    assert_eq!(store.list().unwrap().len(), 2);
}
