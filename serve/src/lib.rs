//! HTTP surface for the pipeline execution engine (spec §4.7, §6): axum router,
//! NDJSON event streaming, the per-job event log.

mod app;
mod error;
mod event_log;
mod logging;
mod ndjson;
mod routes;
mod wire;

use std::sync::Arc;
use std::time::Instant;

use engine::{CheckpointStore, Executor, JobStore, PipelineRegistry, ProviderRegistry};
use tokio::net::TcpListener;
use tracing::info;

pub use app::AppState;
pub use event_log::EventLogRegistry;
pub use logging::{init_tracing, LogReloadHandle};

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Provider environment variables read at startup (spec §6 "Environment
/// variables"), applied to the registry's seeded default profiles.
#[derive(Clone, Debug, Default)]
pub struct ProviderEnv {
    pub openai_base_url: Option<String>,
    pub openai_model: Option<String>,
    pub enable_ollama: bool,
    pub ollama_base_url: Option<String>,
    pub ollama_model: Option<String>,
}

impl ProviderEnv {
    pub fn from_process_env() -> Self {
        let truthy = |v: String| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        ProviderEnv {
            openai_base_url: std::env::var("PIPELINE_ENGINE_OPENAI_BASE_URL").ok(),
            openai_model: std::env::var("PIPELINE_ENGINE_OPENAI_MODEL").ok(),
            enable_ollama: std::env::var("PIPELINE_ENGINE_ENABLE_OLLAMA")
                .ok()
                .map(truthy)
                .unwrap_or(false),
            ollama_base_url: std::env::var("PIPELINE_ENGINE_OLLAMA_BASE_URL").ok(),
            ollama_model: std::env::var("PIPELINE_ENGINE_OLLAMA_MODEL").ok(),
        }
    }
}

async fn apply_provider_env(providers: &ProviderRegistry, env: &ProviderEnv) {
    use engine::model::{ProviderKind, ProviderProfile};

    if env.openai_base_url.is_some() || env.openai_model.is_some() {
        providers
            .upsert_profile(ProviderProfile {
                id: "openai-default".to_string(),
                kind: ProviderKind::Openai,
                base_uri: env.openai_base_url.clone().unwrap_or_default(),
                api_key: None,
                default_model: env.openai_model.clone(),
                extra: Default::default(),
            })
            .await;
    }
    if env.enable_ollama {
        providers
            .upsert_profile(ProviderProfile {
                id: "ollama-default".to_string(),
                kind: ProviderKind::Ollama,
                base_uri: env
                    .ollama_base_url
                    .clone()
                    .unwrap_or_else(|| "http://127.0.0.1:11434".to_string()),
                api_key: None,
                default_model: env.ollama_model.clone(),
                extra: Default::default(),
            })
            .await;
    }
}

/// Builds a fresh `Executor` plus `AppState`, applying `provider_env` to the
/// seeded default profiles.
pub async fn build_app(provider_env: ProviderEnv, log_reload: Option<LogReloadHandle>) -> Arc<AppState> {
    let providers = Arc::new(ProviderRegistry::new());
    apply_provider_env(&providers, &provider_env).await;
    let executor = Executor::new(
        JobStore::new(),
        CheckpointStore::new(),
        providers,
        Arc::new(PipelineRegistry::new()),
    );
    Arc::new(AppState {
        executor,
        event_logs: EventLogRegistry::new(),
        started_at: Instant::now(),
        log_reload,
    })
}

/// Runs the HTTP surface on an already-bound listener. Tests bind to
/// `127.0.0.1:0` and read back the assigned port from the listener before
/// calling this.
pub async fn run_serve_on_listener(
    listener: TcpListener,
    provider_env: ProviderEnv,
    log_reload: Option<LogReloadHandle>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    let state = build_app(provider_env, log_reload).await;
    info!(%addr, "pipeline engine listening");
    axum::serve(listener, app::router(state)).await?;
    Ok(())
}

/// Runs the HTTP surface. `addr` defaults to `PIPELINE_ENGINE_ADDR`, or
/// `127.0.0.1:8080` if that is unset, when `None` is passed.
pub async fn run_serve(
    addr: Option<&str>,
    provider_env: ProviderEnv,
    log_reload: Option<LogReloadHandle>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = addr
        .map(str::to_string)
        .or_else(|| std::env::var("PIPELINE_ENGINE_ADDR").ok())
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());
    let listener = TcpListener::bind(&addr).await?;
    run_serve_on_listener(listener, provider_env, log_reload).await
}
