//! Provider Registry (spec §4.2): resolves a step to a `(Provider, ResolvedProfile)` pair.

mod registry;

pub use registry::{ProviderFactory, ProviderRegistry};

use thiserror::Error;

/// Failure modes for provider resolution (spec §7 Validation/Not-found tags).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("step has no provider_profile_id")]
    MissingProfileId,
    #[error("provider profile not found: {0}")]
    ProfileNotFound(String),
    #[error("no provider factory registered for kind {0:?}")]
    KindNotRegistered(crate::model::ProviderKind),
}

impl RegistryError {
    pub fn tag(&self) -> &'static str {
        match self {
            RegistryError::MissingProfileId => "missing_profile_id",
            RegistryError::ProfileNotFound(_) => "profile_not_found",
            RegistryError::KindNotRegistered(_) => "kind_not_registered",
        }
    }
}
