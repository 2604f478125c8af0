//! Pipeline execution engine: the single-node DAG executor described in
//! spec.md — job store, provider registry, providers, prompt builder,
//! streaming tracker, and the supervisor that ties them together.

pub mod executor;
pub mod model;
pub mod pipeline_registry;
pub mod prompt;
pub mod providers;
pub mod registry;
pub mod store;
pub mod streaming;

pub use executor::{Executor, ExecutorError, JobRequest};
pub use pipeline_registry::PipelineRegistry;
pub use registry::ProviderRegistry;
pub use store::{CheckpointStore, JobStore};
pub use streaming::StreamingTracker;
