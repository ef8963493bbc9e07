use crate::core::catalog::{Catalog, Experiment, NewExperiment};
use crate::core::error::DatatraceError;
use crate::core::scalar::ScalarMap;
use crate::core::time;
use tracing::info;

/// Append-only ledger of experiment runs, each bound to one dataset version.
pub struct ExperimentLedger<'a> {
    catalog: &'a Catalog,
}

impl<'a> ExperimentLedger<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Records a run against `dataset_ref` (version id or any unambiguous
    /// hash prefix). Unknown or ambiguous references fail before any write.
    pub fn log(
        &self,
        name: &str,
        dataset_ref: &str,
        params: ScalarMap,
        metrics: ScalarMap,
    ) -> Result<i64, DatatraceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DatatraceError::InvalidArgument(
                "experiment name is empty".to_string(),
            ));
        }
        let dataset = self.catalog.find_dataset_by_prefix(dataset_ref)?;

        let id = self.catalog.insert_experiment(&NewExperiment {
            name: name.to_string(),
            dataset_hash: dataset.content_hash,
            params,
            metrics,
            created_at: time::now_rfc3339(),
        })?;
        info!(
            experiment_id = id,
            experiment = name,
            version_id = %dataset.version_id,
            "experiment logged"
        );
        Ok(id)
    }

    /// Every experiment, most recent first.
    pub fn history(&self) -> Result<Vec<Experiment>, DatatraceError> {
        self.catalog.list_experiments()
    }

    pub fn get(&self, id: i64) -> Result<Experiment, DatatraceError> {
        self.catalog
            .get_experiment(id)?
            .ok_or_else(|| DatatraceError::NotFound(format!("experiment {}", id)))
    }

    /// Experiments linked to the dataset `dataset_ref` resolves to.
    pub fn for_dataset(&self, dataset_ref: &str) -> Result<Vec<Experiment>, DatatraceError> {
        let dataset = self.catalog.find_dataset_by_prefix(dataset_ref)?;
        self.catalog.experiments_for_dataset(&dataset.content_hash)
    }

    /// Links an existing experiment to a further dataset version.
    pub fn link(&self, experiment_id: i64, dataset_ref: &str) -> Result<(), DatatraceError> {
        let dataset = self.catalog.find_dataset_by_prefix(dataset_ref)?;
        self.catalog
            .link_experiment_dataset(experiment_id, &dataset.content_hash)
    }
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "experiments",
        "version": "0.1.0",
        "description": "Experiment ledger bound to dataset versions",
        "commands": [
            { "name": "log", "parameters": ["name", "dataset", "param", "metric"] },
            { "name": "list", "description": "List experiments, newest first" },
            { "name": "show", "parameters": ["id"] },
            { "name": "link", "parameters": ["id", "dataset"] }
        ],
        "storage": ["catalog.db"]
    })
}
