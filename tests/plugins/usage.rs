use datatrace::core::catalog::Catalog;
use datatrace::core::config::Config;
use datatrace::core::error::ErrorKind;
use datatrace::plugins::usage::UsageAuditLog;
use datatrace::plugins::versions::VersionStore;
use std::fs;
use tempfile::{TempDir, tempdir};

fn open_store() -> (TempDir, Catalog) {
    let tmp = tempdir().unwrap();
    let catalog = Catalog::open(Config::with_root(tmp.path().join("datastore"))).unwrap();
    (tmp, catalog)
}

fn add_file(tmp: &TempDir, catalog: &Catalog, name: &str, body: &str) -> String {
    let p = tmp.path().join(name);
    fs::write(&p, body).unwrap();
    VersionStore::new(catalog).add(&p, None).unwrap()
}

#[test]
fn test_track_requires_both_fields() {
    let (tmp, catalog) = open_store();
    let vid = add_file(&tmp, &catalog, "d.csv", "a\n1\n");
    let log = UsageAuditLog::new(&catalog);

    assert_eq!(log.track("", "used").unwrap_err().kind(), ErrorKind::InvalidArgument);
    assert_eq!(log.track(&vid, "   ").unwrap_err().kind(), ErrorKind::InvalidArgument);
    assert!(log.all().unwrap().is_empty());
}

#[test]
fn test_track_then_for_dataset_returns_event() {
    let (tmp, catalog) = open_store();
    let vid = add_file(&tmp, &catalog, "d.csv", "a\n1\n");
    let log = UsageAuditLog::new(&catalog);

    log.track(&vid, "used in training").unwrap();
    let events = log.for_dataset(&vid).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, "used in training");
    assert!(events[0].dataset_ref.starts_with(&vid));
    assert_eq!(events[0].dataset_ref.len(), 64);
}

#[test]
fn test_events_are_scoped_per_dataset_and_newest_first() {
    let (tmp, catalog) = open_store();
    let a = add_file(&tmp, &catalog, "a.csv", "a\n1\n");
    let b = add_file(&tmp, &catalog, "b.csv", "b\n2\n");
    let log = UsageAuditLog::new(&catalog);

    log.track(&a, "profiled").unwrap();
    log.track(&b, "visualized").unwrap();
    log.track(&a, "used in training").unwrap();

    let actions: Vec<String> = log
        .for_dataset(&a)
        .unwrap()
        .into_iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(actions, vec!["used in training", "profiled"]);
    assert_eq!(log.all().unwrap().len(), 3);
}

#[test]
fn test_unknown_reference_is_still_recorded() {
    let (_tmp, catalog) = open_store();
    let log = UsageAuditLog::new(&catalog);

    log.track("ABCDEF01", "archived offline").unwrap();
    let events = log.for_dataset("abcdef01").unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].dataset_ref, "abcdef01");
}

#[test]
fn test_malformed_reference_is_rejected() {
    let (_tmp, catalog) = open_store();
    let err = UsageAuditLog::new(&catalog)
        .track("not a hash", "used")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}
