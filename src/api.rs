//! The command/query surface front ends call into.
//!
//! Thin functions over the components, each taking the process-wide
//! [`Catalog`] handle explicitly.

use crate::core::catalog::{Catalog, Experiment, UsageEvent};
use crate::core::error::DatatraceError;
use crate::core::scalar::{Scalar, ScalarMap};
use crate::plugins::experiments::ExperimentLedger;
use crate::plugins::metrics::MetricQuery;
use crate::plugins::usage::UsageAuditLog;
use crate::plugins::versions::VersionStore;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetSummary {
    pub version_id: String,
    pub source_path: String,
    pub row_count: u64,
    pub column_count: u64,
    pub created_at: String,
}

/// Fails with `NotFound` when `path` does not exist.
pub fn add_dataset(
    catalog: &Catalog,
    path: &Path,
    metadata: Option<BTreeMap<String, String>>,
) -> Result<String, DatatraceError> {
    VersionStore::new(catalog).add(path, metadata)
}

pub fn list_datasets(catalog: &Catalog) -> Result<Vec<DatasetSummary>, DatatraceError> {
    Ok(VersionStore::new(catalog)
        .list()?
        .into_iter()
        .map(|d| DatasetSummary {
            version_id: d.version_id,
            source_path: d.source_path,
            row_count: d.row_count,
            column_count: d.column_count,
            created_at: d.created_at,
        })
        .collect())
}

/// Fails with `NotFound` or `AmbiguousReference` before writing anything.
pub fn log_experiment(
    catalog: &Catalog,
    name: &str,
    dataset_ref: &str,
    params: ScalarMap,
    metrics: ScalarMap,
) -> Result<i64, DatatraceError> {
    ExperimentLedger::new(catalog).log(name, dataset_ref, params, metrics)
}

pub fn get_experiments(catalog: &Catalog) -> Result<Vec<Experiment>, DatatraceError> {
    ExperimentLedger::new(catalog).history()
}

/// Fails with `InvalidArgument` when either field is empty.
pub fn track_usage(
    catalog: &Catalog,
    dataset_ref: &str,
    action: &str,
) -> Result<(), DatatraceError> {
    UsageAuditLog::new(catalog).track(dataset_ref, action)
}

pub fn usage_for(
    catalog: &Catalog,
    dataset_ref: &str,
) -> Result<Vec<UsageEvent>, DatatraceError> {
    UsageAuditLog::new(catalog).for_dataset(dataset_ref)
}

/// `(label, value)` pairs in chronological order; empty when nothing has the metric.
pub fn query_metric(
    catalog: &Catalog,
    name: &str,
) -> Result<Vec<(String, Scalar)>, DatatraceError> {
    Ok(MetricQuery::new(catalog)
        .series(name)?
        .into_iter()
        .map(|p| (p.label, p.value))
        .collect())
}
