//! DAG Executor (spec §4.5): the heart of the system. One supervisor task per job
//! owns all mutations to that job's record until a terminal state is reached.

mod step_modes;

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::model::{
    Job, JobError, JobInput, JobMode, JobStatus, PipelineDef, ResultItem, StepExecution,
    StepStatus,
};
use crate::pipeline_registry::PipelineRegistry;
use crate::providers::ProviderError;
use crate::registry::{ProviderRegistry, RegistryError};
use crate::store::{CheckpointStore, JobStore};
use step_modes::ResolvedProvider;

/// The validated request that starts a job (spec §4.5 entry, §6 `JobRequest`).
#[derive(Clone, Debug)]
pub struct JobRequest {
    pub pipeline_type: String,
    pub input: JobInput,
    pub mode: JobMode,
    pub parent_job_id: Option<String>,
    pub from_step_id: Option<String>,
    pub reuse_upstream: bool,
}

/// Request-level failures (spec §7 Validation / Not-found tags). Errors that occur
/// mid-execution are recorded on the step/job instead of being returned here
/// (spec §7 propagation policy: "Execution errors do not abort the engine").
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("pipeline_type must not be empty")]
    InvalidRequest,
    #[error("unknown step id: {0}")]
    UnknownStep(String),
    #[error("job not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ExecutorError {
    pub fn tag(&self) -> &'static str {
        match self {
            ExecutorError::InvalidRequest => "invalid_request",
            ExecutorError::UnknownStep(_) => "unknown_step",
            ExecutorError::NotFound(_) => "not_found",
            ExecutorError::Internal(_) => "internal_error",
        }
    }
}

/// Owns the shared subsystems (store, registries, checkpoints) and the per-job
/// cancellation/pipeline-cache tables. Cheap to clone: every field is itself an
/// `Arc`-backed handle, so a clone can be moved into a spawned supervisor task.
#[derive(Clone)]
pub struct Executor {
    store: JobStore,
    checkpoints: CheckpointStore,
    providers: Arc<ProviderRegistry>,
    pipelines: Arc<PipelineRegistry>,
    cancellations: Arc<DashMap<String, CancellationToken>>,
    pipeline_cache: Arc<DashMap<String, PipelineDef>>,
}

impl Executor {
    pub fn new(
        store: JobStore,
        checkpoints: CheckpointStore,
        providers: Arc<ProviderRegistry>,
        pipelines: Arc<PipelineRegistry>,
    ) -> Self {
        Executor {
            store,
            checkpoints,
            providers,
            pipelines,
            cancellations: Arc::new(DashMap::new()),
            pipeline_cache: Arc::new(DashMap::new()),
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    pub fn providers(&self) -> &Arc<ProviderRegistry> {
        &self.providers
    }

    pub fn pipelines(&self) -> &Arc<PipelineRegistry> {
        &self.pipelines
    }

    /// Entry point (spec §4.5 "Entry"): validates the request, resolves the
    /// pipeline, constructs the job record, and either runs the supervisor inline
    /// (`mode = sync`) or spawns it and returns the `queued` job immediately.
    pub async fn run_job(&self, req: JobRequest) -> Result<Job, ExecutorError> {
        if req.pipeline_type.is_empty() {
            return Err(ExecutorError::InvalidRequest);
        }
        let pipeline = self.pipelines.resolve(&req.pipeline_type).await;
        if let Some(step_id) = &req.from_step_id {
            if pipeline.step_index(step_id).is_none() {
                return Err(ExecutorError::UnknownStep(step_id.clone()));
            }
        }

        let now = chrono::Utc::now();
        let job_id = uuid::Uuid::new_v4().simple().to_string();
        let job = Job {
            id: job_id.clone(),
            pipeline_type: pipeline.pipeline_type.clone(),
            pipeline_version: pipeline.version.clone(),
            status: JobStatus::Queued,
            created_at: now,
            updated_at: now,
            input: req.input,
            mode: req.mode,
            parent_job_id: req.parent_job_id,
            rerun_from_step: req.from_step_id,
            reuse_upstream: req.reuse_upstream,
            step_executions: pipeline
                .steps
                .iter()
                .map(|s| StepExecution::pending(s.id.clone()))
                .collect(),
            result: None,
            error: None,
        };

        self.cancellations
            .insert(job_id.clone(), CancellationToken::new());
        self.pipeline_cache.insert(job_id.clone(), pipeline);
        self.store
            .create(job.clone())
            .await
            .map_err(|e| ExecutorError::Internal(e.to_string()))?;

        info!(job_id = %job_id, pipeline_type = %job.pipeline_type, mode = ?job.mode, "job created");

        if job.mode == JobMode::Sync {
            self.supervisor_loop(job_id.clone()).await;
            self.store
                .get(&job_id)
                .await
                .map_err(|e| ExecutorError::Internal(e.to_string()))
        } else {
            let executor = self.clone();
            let spawn_id = job_id.clone();
            tokio::spawn(async move {
                executor.supervisor_loop(spawn_id).await;
            });
            Ok(job)
        }
    }

    /// `cancel_job` (spec §5): idempotent on an already-terminal job; otherwise
    /// triggers cancellation and atomically writes the terminal `cancelled` state.
    pub async fn cancel_job(
        &self,
        job_id: &str,
        reason: Option<String>,
    ) -> Result<Job, ExecutorError> {
        let mut job = self
            .store
            .get(job_id)
            .await
            .map_err(|_| ExecutorError::NotFound(job_id.to_string()))?;

        if job.status.is_terminal() {
            return Ok(job);
        }

        if let Some(token) = self.cancellations.get(job_id) {
            token.cancel();
        }

        let now = chrono::Utc::now();
        for exec in job.step_executions.iter_mut() {
            if matches!(exec.status, StepStatus::Pending | StepStatus::Running) {
                exec.status = StepStatus::Cancelled;
                exec.finished_at = Some(now);
            }
        }
        job.status = JobStatus::Cancelled;
        job.error = Some(JobError::cancelled(reason.as_deref()));
        job.touch();

        self.store
            .update(job.clone())
            .await
            .map_err(|e| ExecutorError::Internal(e.to_string()))?;
        self.cancellations.remove(job_id);
        self.pipeline_cache.remove(job_id);

        warn!(job_id = %job_id, "job cancelled");
        Ok(job)
    }

    /// Reruns `parent_id` from `from_step_id` (or the first step), optionally
    /// reusing the parent's checkpointed upstream items (spec §4.5 entry, §8
    /// scenario 4).
    pub async fn rerun_job(
        &self,
        parent_id: &str,
        from_step_id: Option<String>,
        reuse_upstream: bool,
        override_input: Option<JobInput>,
    ) -> Result<Job, ExecutorError> {
        let parent = self
            .store
            .get(parent_id)
            .await
            .map_err(|_| ExecutorError::NotFound(parent_id.to_string()))?;

        let req = JobRequest {
            pipeline_type: parent.pipeline_type.clone(),
            input: override_input.unwrap_or(parent.input),
            mode: JobMode::Rerun,
            parent_job_id: Some(parent.id.clone()),
            from_step_id,
            reuse_upstream,
        };
        self.run_job(req).await
    }

    /// The per-job supervisor (spec §4.5 "Supervisor loop"). Runs until the job
    /// reaches a terminal status; every mutation to `job` is persisted through
    /// `self.store` before the next suspension point.
    async fn supervisor_loop(&self, job_id: String) {
        let mut job = match self.store.get(&job_id).await {
            Ok(job) => job,
            Err(_) => return,
        };

        let pipeline = self
            .pipeline_cache
            .get(&job_id)
            .map(|entry| entry.clone())
            .unwrap_or_else(|| PipelineDef::default_single_step(&job.pipeline_type));

        let start_index = job
            .rerun_from_step
            .as_deref()
            .and_then(|id| pipeline.step_index(id))
            .unwrap_or(0);

        let mut outputs: HashMap<String, Vec<ResultItem>> = HashMap::new();

        if job.reuse_upstream {
            if let Some(parent_id) = job.parent_job_id.clone() {
                let parent_checkpoints = self.checkpoints.load_all(&parent_id).await;
                for step in pipeline.steps.iter().take(start_index) {
                    if let Some(items) = parent_checkpoints.get(&step.id) {
                        outputs.insert(step.id.clone(), items.clone());
                        if let Some(exec) = job.step_execution_mut(&step.id) {
                            exec.status = StepStatus::Skipped;
                        }
                        if step.export {
                            job.result_mut().items.extend(items.clone());
                        }
                    }
                }
            }
        }

        job.status = JobStatus::Running;
        job.touch();
        if self.store.update(job.clone()).await.is_err() {
            return;
        }
        info!(job_id = %job_id, "job running");

        let cancel = self
            .cancellations
            .get(&job_id)
            .map(|entry| entry.clone())
            .unwrap_or_default();

        for (index, step) in pipeline.steps.iter().enumerate() {
            if job.reuse_upstream && index < start_index {
                continue;
            }
            if cancel.is_cancelled() {
                break;
            }

            if let Some(missing) = step.depends_on.iter().find(|d| !outputs.contains_key(*d)) {
                let message = format!("missing dependency: {missing}");
                self.fail_step(&mut job, &step.id, "missing_dependency", message, false)
                    .await;
                return;
            }

            if let Some(exec) = job.step_execution_mut(&step.id) {
                exec.status = StepStatus::Running;
                exec.started_at = Some(chrono::Utc::now());
            }
            job.touch();
            if self.store.update(job.clone()).await.is_err() {
                return;
            }

            let prompt = crate::prompt::build_prompt(step, &job, &outputs);

            let resolved = match self.providers.resolve(step).await {
                Ok((provider, profile)) => ResolvedProvider::Real(provider, profile),
                Err(RegistryError::MissingProfileId) => ResolvedProvider::None,
                Err(other) => {
                    self.fail_step(&mut job, &step.id, other.tag(), other.to_string(), false)
                        .await;
                    return;
                }
            };

            let outcome = step_modes::run_step(
                step,
                &mut job,
                &self.store,
                &resolved,
                &prompt,
                &outputs,
                cancel.clone(),
            )
            .await;

            match outcome {
                Ok(items) => {
                    if cancel.is_cancelled() {
                        // cancel_job already wrote the terminal state; stop rather
                        // than resurrect the job with a fresh store write.
                        return;
                    }
                    if let Some(exec) = job.step_execution_mut(&step.id) {
                        exec.status = StepStatus::Success;
                        exec.finished_at = Some(chrono::Utc::now());
                    }
                    outputs.insert(step.id.clone(), items.clone());
                    self.checkpoints.save(&job.id, &step.id, &items).await;
                    if step.export {
                        job.result_mut().items.extend(items);
                    }
                    job.touch();
                    if self.store.update(job.clone()).await.is_err() {
                        return;
                    }
                }
                Err(err) => {
                    let cancelled = matches!(err, ProviderError::Cancelled);
                    self.fail_step(&mut job, &step.id, err.tag(), err.to_string(), cancelled)
                        .await;
                    return;
                }
            }
        }

        if !cancel.is_cancelled() {
            job.status = JobStatus::Succeeded;
            job.touch();
            let _ = self.store.update(job.clone()).await;
            info!(job_id = %job_id, "job succeeded");
        }

        self.cancellations.remove(&job_id);
        self.pipeline_cache.remove(&job_id);
    }

    /// Records a step (and job) failure/cancellation. Re-reads the store first so
    /// a concurrent `cancel_job` call that already wrote the terminal state is
    /// never clobbered by a late in-flight step's own error classification.
    async fn fail_step(
        &self,
        job: &mut Job,
        step_id: &str,
        code: &str,
        message: String,
        cancelled: bool,
    ) {
        if let Ok(current) = self.store.get(&job.id).await {
            if current.status.is_terminal() {
                self.cancellations.remove(&job.id);
                self.pipeline_cache.remove(&job.id);
                return;
            }
        }

        let now = chrono::Utc::now();
        if let Some(exec) = job.step_execution_mut(step_id) {
            exec.status = if cancelled {
                StepStatus::Cancelled
            } else {
                StepStatus::Failed
            };
            exec.finished_at = Some(now);
            exec.error = Some(JobError::new(code, message.clone()));
        }
        job.status = if cancelled {
            JobStatus::Cancelled
        } else {
            JobStatus::Failed
        };
        job.error = Some(JobError::new(code, message));
        job.touch();
        let _ = self.store.update(job.clone()).await;

        warn!(job_id = %job.id, step_id = %step_id, code = %code, "step failed");

        self.cancellations.remove(&job.id);
        self.pipeline_cache.remove(&job.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PipelineDef, Source, StepDef};

    fn executor() -> Executor {
        Executor::new(
            JobStore::new(),
            CheckpointStore::new(),
            Arc::new(ProviderRegistry::new()),
            Arc::new(PipelineRegistry::new()),
        )
    }

    fn source(content: &str) -> Source {
        Source {
            kind: "note".to_string(),
            label: "m".to_string(),
            content: content.to_string(),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn empty_pipeline_type_is_invalid_request() {
        let exec = executor();
        let err = exec
            .run_job(JobRequest {
                pipeline_type: String::new(),
                input: JobInput::default(),
                mode: JobMode::Sync,
                parent_job_id: None,
                from_step_id: None,
                reuse_upstream: false,
            })
            .await
            .unwrap_err();
        assert_eq!(err.tag(), "invalid_request");
    }

    #[tokio::test]
    async fn unknown_from_step_id_fails_unknown_step() {
        let exec = executor();
        let err = exec
            .run_job(JobRequest {
                pipeline_type: "summarize.v0".to_string(),
                input: JobInput::default(),
                mode: JobMode::Sync,
                parent_job_id: None,
                from_step_id: Some("nope".to_string()),
                reuse_upstream: false,
            })
            .await
            .unwrap_err();
        assert_eq!(err.tag(), "unknown_step");
    }

    /// Scenario 1 (spec §8): unregistered pipeline type falls back to the default
    /// single-step pipeline; the job succeeds with exactly one text item.
    #[tokio::test]
    async fn single_step_success_with_default_pipeline() {
        let exec = executor();
        let job = exec
            .run_job(JobRequest {
                pipeline_type: "summarize.v0".to_string(),
                input: JobInput {
                    sources: vec![source("hi")],
                    options: None,
                },
                mode: JobMode::Sync,
                parent_job_id: None,
                from_step_id: None,
                reuse_upstream: false,
            })
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
        let result = job.result.unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].content_type, "text");
    }

    #[tokio::test]
    async fn cancel_nonexistent_job_is_not_found() {
        let exec = executor();
        let err = exec.cancel_job("missing", None).await.unwrap_err();
        assert_eq!(err.tag(), "not_found");
    }

    #[tokio::test]
    async fn cancel_terminal_job_is_idempotent_noop() {
        let exec = executor();
        let job = exec
            .run_job(JobRequest {
                pipeline_type: "summarize.v0".to_string(),
                input: JobInput::default(),
                mode: JobMode::Sync,
                parent_job_id: None,
                from_step_id: None,
                reuse_upstream: false,
            })
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
        let cancelled_once = exec.cancel_job(&job.id, None).await.unwrap();
        let cancelled_twice = exec.cancel_job(&job.id, None).await.unwrap();
        assert_eq!(cancelled_once.status, JobStatus::Succeeded);
        assert_eq!(cancelled_twice.status, JobStatus::Succeeded);
    }

    /// Scenario 6 (spec §8): a step referencing a missing profile fails the job
    /// with `profile_not_found`.
    #[tokio::test]
    async fn missing_profile_fails_job() {
        let exec = executor();
        let mut step = StepDef {
            id: "step-1".to_string(),
            name: "s1".to_string(),
            ..PipelineDef::default_single_step("t").steps.remove(0)
        };
        step.provider_profile_id = "nonexistent".to_string();
        exec.pipelines
            .register(PipelineDef {
                pipeline_type: "with-missing-profile".to_string(),
                version: "v0".to_string(),
                steps: vec![step],
            })
            .await;

        let job = exec
            .run_job(JobRequest {
                pipeline_type: "with-missing-profile".to_string(),
                input: JobInput::default(),
                mode: JobMode::Sync,
                parent_job_id: None,
                from_step_id: None,
                reuse_upstream: false,
            })
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.unwrap().code, "profile_not_found");
    }

    /// Scenario 3 (spec §8): fanout step A (2 sources, export) feeds single step B
    /// (export); result has 3 items in production order.
    #[tokio::test]
    async fn dag_with_dependency_produces_items_in_order() {
        let exec = executor();
        let step_a = StepDef {
            id: "A".to_string(),
            name: "A".to_string(),
            kind: crate::model::StepKind::Custom,
            mode: crate::model::StepMode::Fanout,
            depends_on: vec![],
            provider_profile_id: String::new(),
            provider_override: Default::default(),
            prompt: Default::default(),
            output_type: "text".to_string(),
            output_format: None,
            config: None,
            export: true,
            export_tag: None,
        };
        let step_b = StepDef {
            id: "B".to_string(),
            name: "B".to_string(),
            kind: crate::model::StepKind::Custom,
            mode: crate::model::StepMode::Single,
            depends_on: vec!["A".to_string()],
            provider_profile_id: String::new(),
            provider_override: Default::default(),
            prompt: Default::default(),
            output_type: "text".to_string(),
            output_format: None,
            config: None,
            export: true,
            export_tag: None,
        };
        exec.pipelines
            .register(PipelineDef {
                pipeline_type: "dag.v0".to_string(),
                version: "v0".to_string(),
                steps: vec![step_a, step_b],
            })
            .await;

        let job = exec
            .run_job(JobRequest {
                pipeline_type: "dag.v0".to_string(),
                input: JobInput {
                    sources: vec![source("s1"), source("s2")],
                    options: None,
                },
                mode: JobMode::Sync,
                parent_job_id: None,
                from_step_id: None,
                reuse_upstream: false,
            })
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Succeeded);
        let items = job.result.unwrap().items;
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].shard_key.as_deref(), Some("A-0"));
        assert_eq!(items[1].shard_key.as_deref(), Some("A-1"));
        assert_eq!(items[2].step_id, "B");
    }

    /// Scenario 4 (spec §8): rerun from `B` with `reuse_upstream=true` skips `A`
    /// and reuses its checkpointed items verbatim.
    #[tokio::test]
    async fn rerun_reuses_upstream_checkpoints() {
        let exec = executor();
        let step_a = StepDef {
            id: "A".to_string(),
            name: "A".to_string(),
            kind: crate::model::StepKind::Custom,
            mode: crate::model::StepMode::Fanout,
            depends_on: vec![],
            provider_profile_id: String::new(),
            provider_override: Default::default(),
            prompt: Default::default(),
            output_type: "text".to_string(),
            output_format: None,
            config: None,
            export: true,
            export_tag: None,
        };
        let step_b = StepDef {
            id: "B".to_string(),
            name: "B".to_string(),
            kind: crate::model::StepKind::Custom,
            mode: crate::model::StepMode::Single,
            depends_on: vec!["A".to_string()],
            provider_profile_id: String::new(),
            provider_override: Default::default(),
            prompt: Default::default(),
            output_type: "text".to_string(),
            output_format: None,
            config: None,
            export: true,
            export_tag: None,
        };
        exec.pipelines
            .register(PipelineDef {
                pipeline_type: "dag.v0".to_string(),
                version: "v0".to_string(),
                steps: vec![step_a, step_b],
            })
            .await;

        let parent = exec
            .run_job(JobRequest {
                pipeline_type: "dag.v0".to_string(),
                input: JobInput {
                    sources: vec![source("s1"), source("s2")],
                    options: None,
                },
                mode: JobMode::Sync,
                parent_job_id: None,
                from_step_id: None,
                reuse_upstream: false,
            })
            .await
            .unwrap();

        let rerun = exec
            .rerun_job(&parent.id, Some("B".to_string()), true, None)
            .await
            .unwrap();
        // rerun is async/rerun mode: spawned. Poll the store until terminal.
        let final_job = wait_terminal(&exec, &rerun.id).await;

        assert_eq!(final_job.parent_job_id.as_deref(), Some(parent.id.as_str()));
        assert_eq!(final_job.step_execution_mut_status("A"), StepStatus::Skipped);
        assert_eq!(final_job.step_execution_mut_status("B"), StepStatus::Success);
        let items = final_job.result.unwrap().items;
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].shard_key.as_deref(), Some("A-0"));
        assert_eq!(items[1].shard_key.as_deref(), Some("A-1"));
    }

    trait TestJobExt {
        fn step_execution_mut_status(&self, step_id: &str) -> StepStatus;
    }

    impl TestJobExt for Job {
        fn step_execution_mut_status(&self, step_id: &str) -> StepStatus {
            self.step_executions
                .iter()
                .find(|s| s.step_id == step_id)
                .unwrap()
                .status
        }
    }

    async fn wait_terminal(exec: &Executor, job_id: &str) -> Job {
        for _ in 0..200 {
            let job = exec.store.get(job_id).await.unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("job {job_id} never reached a terminal status");
    }
}
