use datatrace::core::catalog::{Catalog, Dataset, DatasetKind};
use datatrace::core::config::Config;
use datatrace::core::error::{DatatraceError, ErrorKind};
use datatrace::core::scalar::{Scalar, ScalarMap};
use datatrace::plugins::experiments::ExperimentLedger;
use datatrace::plugins::versions::VersionStore;
use rusqlite::Connection;
use std::collections::BTreeMap;
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

fn row_counts(catalog: &Catalog) -> (i64, i64) {
    let conn = Connection::open(catalog.db_path()).unwrap();
    let experiments = conn
        .query_row("SELECT COUNT(*) FROM experiments", [], |r| r.get(0))
        .unwrap();
    let links = conn
        .query_row("SELECT COUNT(*) FROM experiment_datasets", [], |r| r.get(0))
        .unwrap();
    (experiments, links)
}

fn synthetic_dataset(content_hash: &str) -> Dataset {
    Dataset {
        content_hash: content_hash.to_string(),
        version_id: content_hash[..8].to_string(),
        kind: DatasetKind::File,
        source_path: "/synthetic".to_string(),
        stored_path: format!("/synthetic/{}", content_hash),
        row_count: 0,
        column_count: 0,
        metadata: BTreeMap::new(),
        created_at: "2026-01-01T00:00:00.000Z".to_string(),
    }
}

#[test]
fn test_log_against_unknown_prefix_writes_nothing() {
    let (_tmp, catalog) = open_store();
    let err = ExperimentLedger::new(&catalog)
        .log("run1", "ffffffff", ScalarMap::new(), ScalarMap::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(row_counts(&catalog), (0, 0));
}

#[test]
fn test_log_against_ambiguous_prefix_writes_nothing() {
    let (_tmp, catalog) = open_store();
    let a = format!("0badc0de{}", "1".repeat(56));
    let b = format!("0badc0de{}", "2".repeat(56));
    catalog.upsert_dataset(&synthetic_dataset(&a)).unwrap();
    catalog.upsert_dataset(&synthetic_dataset(&b)).unwrap();

    let ledger = ExperimentLedger::new(&catalog);
    let err = ledger
        .log("run1", "0badc0de", ScalarMap::new(), ScalarMap::new())
        .unwrap_err();
    assert!(matches!(
        err,
        DatatraceError::AmbiguousReference { matches: 2, .. }
    ));
    assert_eq!(row_counts(&catalog), (0, 0));

    // A longer prefix disambiguates.
    ledger
        .log("run1", "0badc0de1", ScalarMap::new(), ScalarMap::new())
        .unwrap();
    assert_eq!(row_counts(&catalog), (1, 1));
}

#[test]
fn test_log_records_typed_params_and_links_dataset() {
    let (tmp, catalog) = open_store();
    let vid = add_file(&tmp, &catalog, "d.csv", "a,b\n1,2\n");

    let mut params = ScalarMap::new();
    params.insert("lr".into(), Scalar::Float(0.01));
    params.insert("epochs".into(), Scalar::Int(20));
    params.insert("optimizer".into(), Scalar::Text("adam".into()));
    let mut metrics = ScalarMap::new();
    metrics.insert("accuracy".into(), Scalar::Float(0.9));
    metrics.insert("converged".into(), Scalar::Bool(true));

    let ledger = ExperimentLedger::new(&catalog);
    let id = ledger.log("e1", &vid, params.clone(), metrics.clone()).unwrap();

    let e = ledger.get(id).unwrap();
    assert_eq!(e.name, "e1");
    assert_eq!(e.params, params);
    assert_eq!(e.metrics, metrics);
    assert!(e.dataset_ref.starts_with(&vid));
    assert_eq!(e.dataset_ref.len(), 64);
    assert_eq!(catalog.linked_datasets(id).unwrap(), vec![e.dataset_ref.clone()]);
}

#[test]
fn test_params_keep_the_order_they_were_logged_in() {
    let (tmp, catalog) = open_store();
    let vid = add_file(&tmp, &catalog, "d.csv", "a,b\n1,2\n");

    let mut params = ScalarMap::new();
    params.insert("lr".into(), Scalar::Float(0.1));
    params.insert("batch".into(), Scalar::Int(32));

    let ledger = ExperimentLedger::new(&catalog);
    let id = ledger.log("ordered", &vid, params, ScalarMap::new()).unwrap();

    let e = ledger.get(id).unwrap();
    let keys: Vec<&str> = e.params.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["lr", "batch"]);
}

#[test]
fn test_history_is_most_recent_first_with_monotonic_ids() {
    let (tmp, catalog) = open_store();
    let vid = add_file(&tmp, &catalog, "d.csv", "x\n1\n");
    let ledger = ExperimentLedger::new(&catalog);

    let ids: Vec<i64> = ["a", "b", "c"]
        .iter()
        .map(|n| ledger.log(n, &vid, ScalarMap::new(), ScalarMap::new()).unwrap())
        .collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));

    let names: Vec<String> = ledger.history().unwrap().into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["c", "b", "a"]);
}

#[test]
fn test_for_dataset_and_extra_links() {
    let (tmp, catalog) = open_store();
    let train = add_file(&tmp, &catalog, "train.csv", "x\n1\n");
    let test = add_file(&tmp, &catalog, "test.csv", "x\n2\n");
    let ledger = ExperimentLedger::new(&catalog);

    let id = ledger.log("e1", &train, ScalarMap::new(), ScalarMap::new()).unwrap();
    ledger.log("e2", &test, ScalarMap::new(), ScalarMap::new()).unwrap();
    assert!(ledger.for_dataset(&train).unwrap().iter().all(|e| e.name == "e1"));

    ledger.link(id, &test).unwrap();
    ledger.link(id, &test).unwrap();
    let on_test: Vec<String> = ledger
        .for_dataset(&test)
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(on_test, vec!["e2", "e1"]);
    assert_eq!(catalog.linked_datasets(id).unwrap().len(), 2);
}

#[test]
fn test_empty_name_is_rejected() {
    let (tmp, catalog) = open_store();
    let vid = add_file(&tmp, &catalog, "d.csv", "x\n1\n");
    let err = ExperimentLedger::new(&catalog)
        .log("  ", &vid, ScalarMap::new(), ScalarMap::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_get_unknown_experiment_is_not_found() {
    let (_tmp, catalog) = open_store();
    let err = ExperimentLedger::new(&catalog).get(42).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
