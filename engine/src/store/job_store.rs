//! In-memory job store: a single reader-writer lock over `job_id -> Job`.
//!
//! Every operation returns or accepts an owned `Job` with no shared pointers inside
//! it, so `.clone()` at ingress/egress gives the deep-copy-on-read/write guarantee
//! spec §3 requires without any extra bookkeeping.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::model::Job;

use super::StoreError;

/// Thread-safe in-memory map of job id to job record.
#[derive(Clone, Default)]
pub struct JobStore {
    inner: Arc<RwLock<HashMap<String, Job>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a deep copy of `job`. Fails with `AlreadyExists` if the id collides.
    pub async fn create(&self, job: Job) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        if guard.contains_key(&job.id) {
            return Err(StoreError::AlreadyExists(job.id));
        }
        guard.insert(job.id.clone(), job);
        Ok(())
    }

    /// Overwrites the stored job with a deep copy. Fails with `NotFound` if absent.
    pub async fn update(&self, job: Job) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        if !guard.contains_key(&job.id) {
            return Err(StoreError::NotFound(job.id));
        }
        guard.insert(job.id.clone(), job);
        Ok(())
    }

    /// Returns a deep copy of the job, or `NotFound`.
    pub async fn get(&self, id: &str) -> Result<Job, StoreError> {
        let guard = self.inner.read().await;
        guard
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Returns deep copies of all stored jobs, in arbitrary order.
    pub async fn list(&self) -> Vec<Job> {
        let guard = self.inner.read().await;
        guard.values().cloned().collect()
    }
}
