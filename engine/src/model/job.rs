//! Jobs, step executions, and results — the mutable state a supervisor owns.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::pipeline::JobInput;

/// A job's lifecycle state. `Succeeded | Failed | Cancelled` are terminal: once
/// reached, no further transition occurs (spec.md §3 invariants).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// How a job was submitted: drives whether `run_job` runs inline or is spawned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobMode {
    Sync,
    Async,
    Rerun,
}

/// A step execution's status. A step never transitions from `Success` back to
/// `Running` (spec.md §3 invariant).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
    Cancelled,
}

/// An incremental fragment of a provider's output, ordered within a step.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chunk {
    pub step_id: String,
    pub index: usize,
    pub content: String,
}

/// One step's execution record within a job.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepExecution {
    pub step_id: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    #[serde(default)]
    pub chunks: Vec<Chunk>,
}

impl StepExecution {
    pub fn pending(step_id: impl Into<String>) -> Self {
        StepExecution {
            step_id: step_id.into(),
            status: StepStatus::Pending,
            started_at: None,
            finished_at: None,
            error: None,
            chunks: Vec::new(),
        }
    }

    /// Appends a chunk with `index = chunks.len()` (spec.md §4.5 step 5).
    pub fn push_chunk(&mut self, content: impl Into<String>) {
        let index = self.chunks.len();
        self.chunks.push(Chunk {
            step_id: self.step_id.clone(),
            index,
            content: content.into(),
        });
    }
}

/// A single produced artifact; the unit that flows between steps and into results.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResultItem {
    pub id: String,
    pub label: String,
    pub step_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_primary: Option<bool>,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub content_type: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// The accumulated output of a job: one `ResultItem` per exported step, in
/// order of production.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct JobResult {
    #[serde(default)]
    pub items: Vec<ResultItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

/// `{code, message}` recorded on a failed/cancelled job or step.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobError {
    pub code: String,
    pub message: String,
}

impl JobError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        JobError {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn cancelled(reason: Option<&str>) -> Self {
        JobError::new("cancelled", reason.unwrap_or("job cancelled").to_string())
    }
}

/// The full mutable record for one pipeline run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub pipeline_type: String,
    pub pipeline_version: String,
    pub status: JobStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub input: JobInput,
    pub mode: JobMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerun_from_step: Option<String>,
    #[serde(default)]
    pub reuse_upstream: bool,
    #[serde(default)]
    pub step_executions: Vec<StepExecution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
}

impl Job {
    /// Marks `updated_at = now`; callers must call this on every mutation so the
    /// monotonic-non-decreasing invariant (spec.md §3) holds.
    pub fn touch(&mut self) {
        let now = chrono::Utc::now();
        self.updated_at = if now >= self.updated_at {
            now
        } else {
            self.updated_at
        };
    }

    pub fn result_mut(&mut self) -> &mut JobResult {
        self.result.get_or_insert_with(JobResult::default)
    }

    pub fn step_execution_mut(&mut self, step_id: &str) -> Option<&mut StepExecution> {
        self.step_executions.iter_mut().find(|s| s.step_id == step_id)
    }
}
