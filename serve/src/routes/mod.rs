//! Route handlers, one module per resource (spec §6 route table).

pub mod cancel;
pub mod config;
pub mod health;
pub mod jobs;
pub mod rerun;
pub mod stream;
