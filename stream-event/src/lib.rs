//! Wire shape of a job's NDJSON event stream: event type + payload + seq/job_id stamping.
//!
//! This crate does not depend on the engine. The engine's streaming tracker produces
//! [`EngineEvent`] values from its own job/step types via `serde_json::to_value`, and the
//! HTTP surface stamps `seq`/`job_id` with [`SeqState`] as it appends to a job's event log.

pub mod envelope;
pub mod event;

pub use envelope::SeqState;
pub use event::EngineEvent;
