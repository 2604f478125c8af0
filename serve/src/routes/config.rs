//! `POST /v1/config/providers`, `POST /v1/config/engine` (spec §6).

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use engine::model::ProviderProfile;
use serde_json::{Map, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::wire::{EngineConfigRequest, ProviderProfileWire};

pub async fn upsert_provider(
    State(state): State<Arc<AppState>>,
    Json(wire): Json<ProviderProfileWire>,
) -> Result<Json<ProviderProfile>, ApiError> {
    if wire.id.is_empty() {
        return Err(ApiError::invalid_request("provider profile id must not be empty"));
    }
    let profile: ProviderProfile = wire.into();
    state.executor.providers().upsert_profile(profile.clone()).await;
    Ok(Json(profile))
}

/// Applies `log_level` to the process's reloadable tracing filter, when one was
/// wired up at startup. A filter string that fails to parse is a `config_error`
/// (spec §9 open question: config-mutation failures that aren't validation
/// errors map to `config_error`/500, the same bucket `upsert_provider_profile`
/// would use for an internal failure).
pub async fn reconfigure_engine(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EngineConfigRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut applied = Map::new();
    if let Some(level) = &body.log_level {
        if let Some(handle) = &state.log_reload {
            let filter = tracing_subscriber::EnvFilter::try_new(level)
                .map_err(|e| ApiError::config_error(format!("invalid log_level: {e}")))?;
            handle
                .reload(filter)
                .map_err(|e| ApiError::config_error(e.to_string()))?;
        }
        applied.insert("log_level".to_string(), Value::String(level.clone()));
    }
    Ok(Json(Value::Object(applied)))
}
