use crate::core::catalog::{self, Catalog, UsageEvent};
use crate::core::error::DatatraceError;
use crate::core::time;
use tracing::{debug, info};

/// Append-only audit trail of actions taken against dataset versions.
///
/// There is no update or delete. References that no longer resolve are
/// still recorded as given so the history survives dataset removal.
pub struct UsageAuditLog<'a> {
    catalog: &'a Catalog,
}

impl<'a> UsageAuditLog<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Appends one event. Resolvable references are stored as the full
    /// content hash; unresolvable ones are stored normalized but verbatim.
    pub fn track(&self, dataset_ref: &str, action: &str) -> Result<(), DatatraceError> {
        let action = action.trim();
        if dataset_ref.trim().is_empty() || action.is_empty() {
            return Err(DatatraceError::InvalidArgument(
                "both dataset reference and action are required".to_string(),
            ));
        }
        let normalized = catalog::normalize_ref(dataset_ref)?;

        let stored_ref = match self.catalog.find_dataset_by_prefix(&normalized) {
            Ok(d) => d.content_hash,
            Err(DatatraceError::NotFound(_)) => {
                debug!(dataset_ref = %normalized, "tracking usage of unknown dataset");
                normalized
            }
            Err(e) => return Err(e),
        };

        let id = self
            .catalog
            .insert_usage_event(&stored_ref, action, &time::now_rfc3339())?;
        info!(event_id = id, dataset_ref = %stored_ref, "usage tracked");
        Ok(())
    }

    /// Events for one dataset, most recent first.
    pub fn for_dataset(&self, dataset_ref: &str) -> Result<Vec<UsageEvent>, DatatraceError> {
        let normalized = catalog::normalize_ref(dataset_ref)?;
        match self.catalog.find_dataset_by_prefix(&normalized) {
            Ok(d) => self.catalog.usage_events_matching(&d.content_hash),
            Err(DatatraceError::NotFound(_)) => self.catalog.usage_events_matching(&normalized),
            Err(e) => Err(e),
        }
    }

    /// Every recorded event, most recent first.
    pub fn all(&self) -> Result<Vec<UsageEvent>, DatatraceError> {
        self.catalog.list_usage_events()
    }
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "usage",
        "version": "0.1.0",
        "description": "Append-only dataset usage audit log",
        "commands": [
            { "name": "track", "parameters": ["dataset", "action"] },
            { "name": "usage", "parameters": ["dataset"] }
        ],
        "storage": ["catalog.db"]
    })
}
