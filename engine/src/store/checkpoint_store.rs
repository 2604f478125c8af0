//! Checkpoint sub-store: `(job_id, step_id) -> items`, independent of the job map
//! so checkpoint writes never contend with job reads (spec §4.1, §5).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::model::ResultItem;

/// Thread-safe in-memory map of `(job_id, step_id)` to the items that step produced.
#[derive(Clone, Default)]
pub struct CheckpointStore {
    inner: Arc<RwLock<HashMap<(String, String), Vec<ResultItem>>>>,
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// No-op if `items` is empty; otherwise stores a deep copy keyed by `(job_id, step_id)`.
    pub async fn save(&self, job_id: &str, step_id: &str, items: &[ResultItem]) {
        if items.is_empty() {
            return;
        }
        let mut guard = self.inner.write().await;
        guard.insert((job_id.to_string(), step_id.to_string()), items.to_vec());
    }

    /// Returns a deep copy of every checkpoint recorded for `job_id`, keyed by step id.
    /// Empty if none were saved.
    pub async fn load_all(&self, job_id: &str) -> HashMap<String, Vec<ResultItem>> {
        let guard = self.inner.read().await;
        guard
            .iter()
            .filter(|((jid, _), _)| jid == job_id)
            .map(|((_, step_id), items)| (step_id.clone(), items.clone()))
            .collect()
    }

    /// Removes all checkpoints recorded for `job_id`.
    pub async fn clear(&self, job_id: &str) {
        let mut guard = self.inner.write().await;
        guard.retain(|(jid, _), _| jid != job_id);
    }
}
