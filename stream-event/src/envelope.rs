//! `seq` and `job_id` stamping for events leaving the per-job event log.
//!
//! The engine's streaming tracker never assigns `seq` itself (it is a pure diff over
//! job snapshots); the HTTP surface owns one [`SeqState`] per job and stamps every
//! event as it is appended to that job's log.

use crate::event::EngineEvent;
use serde_json::Value;

/// Per-job sequence counter. `seq` starts at 1 and is dense: the first event appended
/// for a job gets `seq = 1`, the next `seq = 2`, and so on, with no gaps.
pub struct SeqState {
    pub job_id: String,
    pub next_seq: u64,
}

impl SeqState {
    pub fn new(job_id: String) -> Self {
        Self {
            job_id,
            next_seq: 1,
        }
    }

    /// Stamps `seq` and `job_id` onto the event's JSON form and advances the counter.
    pub fn stamp(&mut self, event: &EngineEvent) -> Result<Value, serde_json::Error> {
        let mut value = event.to_value()?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert("seq".to_string(), Value::Number(self.next_seq.into()));
            obj.insert("job_id".to_string(), Value::String(self.job_id.clone()));
        }
        self.next_seq += 1;
        Ok(value)
    }
}
