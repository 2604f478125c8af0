//! Profile and factory maps plus the resolution algorithm.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::model::{ProviderKind, ProviderProfile, StepDef};
use crate::providers::{
    HttpPost, ImageProvider, LocalToolProvider, OllamaProvider, OpenAiProvider, Provider,
    ReqwestHttpPost,
};

use super::RegistryError;

/// Builds a fresh `Provider` instance for a kind. Kept separate from `Provider`
/// itself so the registry can hand out independent instances per resolution
/// without sharing mutable state between callers.
pub trait ProviderFactory: Send + Sync {
    fn create(&self) -> Arc<dyn Provider>;
}

struct FnFactory<F: Fn() -> Arc<dyn Provider> + Send + Sync>(F);

impl<F: Fn() -> Arc<dyn Provider> + Send + Sync> ProviderFactory for FnFactory<F> {
    fn create(&self) -> Arc<dyn Provider> {
        (self.0)()
    }
}

/// Holds provider profiles (by id) and factories (by kind); resolves a step to an
/// executable provider plus the effective, override-merged profile.
pub struct ProviderRegistry {
    profiles: RwLock<HashMap<String, ProviderProfile>>,
    factories: HashMap<ProviderKind, Box<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    /// Seeds stub profiles for each kind plus the standard factory per kind.
    pub fn new() -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpPost::new()))
    }

    pub fn with_http_client(http: Arc<dyn HttpPost>) -> Self {
        let mut factories: HashMap<ProviderKind, Box<dyn ProviderFactory>> = HashMap::new();
        let openai_http = http.clone();
        factories.insert(
            ProviderKind::Openai,
            Box::new(FnFactory(move || {
                Arc::new(OpenAiProvider::new(openai_http.clone())) as Arc<dyn Provider>
            })),
        );
        let ollama_http = http.clone();
        factories.insert(
            ProviderKind::Ollama,
            Box::new(FnFactory(move || {
                Arc::new(OllamaProvider::new(ollama_http.clone())) as Arc<dyn Provider>
            })),
        );
        factories.insert(
            ProviderKind::Image,
            Box::new(FnFactory(|| Arc::new(ImageProvider) as Arc<dyn Provider>)),
        );
        factories.insert(
            ProviderKind::LocalTool,
            Box::new(FnFactory(|| Arc::new(LocalToolProvider) as Arc<dyn Provider>)),
        );

        let mut profiles = HashMap::new();
        for (id, kind) in [
            ("openai-default", ProviderKind::Openai),
            ("ollama-default", ProviderKind::Ollama),
            ("image-default", ProviderKind::Image),
            ("local-tool-default", ProviderKind::LocalTool),
        ] {
            profiles.insert(
                id.to_string(),
                ProviderProfile {
                    id: id.to_string(),
                    kind,
                    base_uri: String::new(),
                    api_key: None,
                    default_model: None,
                    extra: Default::default(),
                },
            );
        }

        Self {
            profiles: RwLock::new(profiles),
            factories,
        }
    }

    /// Resolution algorithm (spec §4.2): profile lookup, override merge, factory
    /// lookup, in that order.
    pub async fn resolve(
        &self,
        step: &StepDef,
    ) -> Result<(Arc<dyn Provider>, ProviderProfile), RegistryError> {
        if step.provider_profile_id.is_empty() {
            return Err(RegistryError::MissingProfileId);
        }
        let base = {
            let guard = self.profiles.read().await;
            guard
                .get(&step.provider_profile_id)
                .cloned()
                .ok_or_else(|| RegistryError::ProfileNotFound(step.provider_profile_id.clone()))?
        };
        let merged = base.merged_with_override(&step.provider_override);
        let factory = self
            .factories
            .get(&merged.kind)
            .ok_or(RegistryError::KindNotRegistered(merged.kind))?;
        Ok((factory.create(), merged))
    }

    /// Stores `profile`, replacing any existing entry with the same id. Empty id is
    /// ignored silently; empty `kind` defaults to `local_tool` (handled by the
    /// caller via `ProviderKind::from_str_or_default` when parsing wire input).
    pub async fn upsert_profile(&self, profile: ProviderProfile) {
        if profile.id.is_empty() {
            return;
        }
        let mut guard = self.profiles.write().await;
        guard.insert(profile.id.clone(), profile);
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
