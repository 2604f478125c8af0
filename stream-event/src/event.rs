//! Wire-level event types for a job's NDJSON event stream.
//!
//! State-carrying variants hold `serde_json::Value`; the engine crate's streaming
//! tracker serializes its job/step/item/chunk structs into that before handing events
//! to this crate. `seq` and `job_id` are not part of this type: they are injected
//! separately by [`crate::envelope::SeqState`] so the tracker itself stays pure.

use serde::Serialize;
use serde_json::Value;

/// One event in a job's stream, tagged by `event` name.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    JobQueued { job: Value },
    JobStarted { job: Value },
    JobStatus { job: Value },
    StepStarted { step: Value },
    StepCompleted { step: Value },
    StepFailed { step: Value },
    StepCancelled { step: Value },
    ItemCompleted { item: Value },
    ProviderChunk { chunk: Value },
    JobCompleted { job: Value },
    JobFailed { job: Value },
    JobCancelled { job: Value },
    StreamFinished,
    Error { message: String },
}

impl EngineEvent {
    /// Serializes this event to a JSON object (event tag + payload only; no seq/job_id).
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// The event's `event` tag as it appears on the wire, e.g. `"step_completed"`.
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::JobQueued { .. } => "job_queued",
            EngineEvent::JobStarted { .. } => "job_started",
            EngineEvent::JobStatus { .. } => "job_status",
            EngineEvent::StepStarted { .. } => "step_started",
            EngineEvent::StepCompleted { .. } => "step_completed",
            EngineEvent::StepFailed { .. } => "step_failed",
            EngineEvent::StepCancelled { .. } => "step_cancelled",
            EngineEvent::ItemCompleted { .. } => "item_completed",
            EngineEvent::ProviderChunk { .. } => "provider_chunk",
            EngineEvent::JobCompleted { .. } => "job_completed",
            EngineEvent::JobFailed { .. } => "job_failed",
            EngineEvent::JobCancelled { .. } => "job_cancelled",
            EngineEvent::StreamFinished => "stream_finished",
            EngineEvent::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_serializes_with_event_tag() {
        let ev = EngineEvent::JobStatus {
            job: serde_json::json!({"id": "job-1", "status": "running"}),
        };
        let v = ev.to_value().unwrap();
        assert_eq!(v["event"], "job_status");
        assert_eq!(v["job"]["status"], "running");
    }

    #[test]
    fn stream_finished_has_no_payload_field() {
        let ev = EngineEvent::StreamFinished;
        let v = ev.to_value().unwrap();
        assert_eq!(v["event"], "stream_finished");
        assert!(v.get("job").is_none());
    }

    #[test]
    fn name_matches_serialized_tag() {
        let ev = EngineEvent::StepFailed {
            step: serde_json::json!({"step_id": "s1"}),
        };
        let v = ev.to_value().unwrap();
        assert_eq!(v["event"].as_str().unwrap(), ev.name());
    }
}
