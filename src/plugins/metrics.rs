//! Read-only projections over the experiment ledger for chart renderers.

use crate::core::catalog::Catalog;
use crate::core::error::DatatraceError;
use crate::core::scalar::Scalar;
use crate::plugins::experiments::ExperimentLedger;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricPoint {
    pub experiment_id: i64,
    /// Experiment name, used as the x-axis label.
    pub label: String,
    /// The stored value as logged; renderers decide how to plot it.
    pub value: Scalar,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: String,
    pub experiments: u64,
}

pub struct MetricQuery<'a> {
    catalog: &'a Catalog,
}

impl<'a> MetricQuery<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// `metric_name` across experiments, oldest first. Experiments without
    /// the key are skipped. An unknown metric yields an empty series.
    pub fn series(&self, metric_name: &str) -> Result<Vec<MetricPoint>, DatatraceError> {
        let history = ExperimentLedger::new(self.catalog).history()?;
        Ok(history
            .into_iter()
            .rev()
            .filter_map(|e| {
                let value = e.metrics.get(metric_name)?.clone();
                Some(MetricPoint {
                    experiment_id: e.id,
                    label: e.name,
                    value,
                    created_at: e.created_at,
                })
            })
            .collect())
    }

    /// Number of experiments logged per UTC day, ascending.
    pub fn experiments_per_day(&self) -> Result<Vec<DailyCount>, DatatraceError> {
        Ok(self
            .catalog
            .experiments_per_day()?
            .into_iter()
            .map(|(date, experiments)| DailyCount { date, experiments })
            .collect())
    }
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "metrics",
        "version": "0.1.0",
        "description": "Metric series and activity counts for visualization",
        "commands": [
            { "name": "metric", "parameters": ["name"] },
            { "name": "activity", "description": "Experiments per day" }
        ],
        "storage": ["catalog.db"]
    })
}
