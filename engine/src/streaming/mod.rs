//! Streaming Tracker (spec §4.6): a pure state machine that diffs successive job
//! snapshots into ordered [`stream_event::EngineEvent`]s. No I/O, no `seq` assignment —
//! that belongs to the HTTP boundary (spec §4.7).

mod tracker;

pub use tracker::StreamingTracker;
