//! Wire-level request/response DTOs for the HTTP surface (spec §6).

use engine::model::{JobInput, JobMode, ProviderKind, ProviderProfile};
use engine::JobRequest;
use serde::Deserialize;
use serde_json::{Map, Value};

/// `POST /v1/jobs` body.
#[derive(Debug, Deserialize)]
pub struct JobRequestWire {
    pub pipeline_type: String,
    #[serde(default)]
    pub input: JobInput,
    #[serde(default)]
    pub mode: Option<JobMode>,
    #[serde(default)]
    pub parent_job_id: Option<String>,
    #[serde(default)]
    pub from_step_id: Option<String>,
    #[serde(default)]
    pub reuse_upstream: bool,
}

impl JobRequestWire {
    /// Converts to the engine's `JobRequest`, defaulting `mode` to `async`
    /// (spec §6: `JobRequest.mode` "default async").
    pub fn into_request(self) -> JobRequest {
        JobRequest {
            pipeline_type: self.pipeline_type,
            input: self.input,
            mode: self.mode.unwrap_or(JobMode::Async),
            parent_job_id: self.parent_job_id,
            from_step_id: self.from_step_id,
            reuse_upstream: self.reuse_upstream,
        }
    }
}

/// `?stream=true` on `POST /v1/jobs`.
#[derive(Debug, Default, Deserialize)]
pub struct CreateJobParams {
    #[serde(default)]
    pub stream: bool,
}

/// `?after_seq=N` on `GET /v1/jobs/{id}/stream`.
#[derive(Debug, Default, Deserialize)]
pub struct StreamParams {
    #[serde(default)]
    pub after_seq: u64,
}

/// `POST /v1/jobs/{id}/cancel` body.
#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// `POST /v1/jobs/{id}/rerun` body.
#[derive(Debug, Default, Deserialize)]
pub struct RerunRequest {
    #[serde(default)]
    pub from_step_id: Option<String>,
    #[serde(default)]
    pub reuse_upstream: bool,
    #[serde(default)]
    pub override_input: Option<JobInput>,
}

/// `POST /v1/config/engine` body.
#[derive(Debug, Default, Deserialize)]
pub struct EngineConfigRequest {
    #[serde(default)]
    pub log_level: Option<String>,
}

/// `POST /v1/config/providers` body. `kind` is a plain string, not the
/// `ProviderKind` enum, so an empty or unknown kind can default to `local_tool`
/// (spec §4.2 `upsert_profile`) instead of failing to deserialize.
#[derive(Debug, Deserialize)]
pub struct ProviderProfileWire {
    pub id: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub base_uri: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl From<ProviderProfileWire> for ProviderProfile {
    fn from(wire: ProviderProfileWire) -> Self {
        ProviderProfile {
            id: wire.id,
            kind: ProviderKind::from_str_or_default(&wire.kind),
            base_uri: wire.base_uri,
            api_key: wire.api_key,
            default_model: wire.default_model,
            extra: wire.extra,
        }
    }
}
