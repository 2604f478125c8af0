//! Pipeline registry: pipeline type -> `PipelineDef` lookup.
//!
//! Registration of demo/sample pipelines is an external collaborator (spec.md §1,
//! "Out of scope: demo pipeline registration"); this registry ships empty and only
//! provides the lookup + default-pipeline fallback the DAG Executor needs at
//! `run_job` time (spec.md §4.5 entry, §8 boundary behavior).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::model::PipelineDef;

/// Thread-safe in-memory map of pipeline type to its definition.
#[derive(Clone, Default)]
pub struct PipelineRegistry {
    inner: Arc<RwLock<HashMap<String, PipelineDef>>>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a pipeline definition under `def.pipeline_type`.
    pub async fn register(&self, def: PipelineDef) {
        let mut guard = self.inner.write().await;
        guard.insert(def.pipeline_type.clone(), def);
    }

    /// Looks up `pipeline_type`, or falls back to the default single-step pipeline
    /// when unregistered (spec.md §4.5 entry, §9 open question: "spec chooses the
    /// default single-step path for robustness").
    pub async fn resolve(&self, pipeline_type: &str) -> PipelineDef {
        let guard = self.inner.read().await;
        guard
            .get(pipeline_type)
            .cloned()
            .unwrap_or_else(|| PipelineDef::default_single_step(pipeline_type))
    }
}
