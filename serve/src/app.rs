//! Axum app: shared state and the route table (spec §6).

use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use engine::Executor;

use crate::event_log::EventLogRegistry;
use crate::error::ApiError;
use crate::logging::LogReloadHandle;
use crate::routes;

/// Shared state reachable from every route handler.
pub struct AppState {
    pub executor: Executor,
    pub event_logs: EventLogRegistry,
    pub started_at: Instant,
    pub log_reload: Option<LogReloadHandle>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route("/v1/jobs", post(routes::jobs::create_job))
        .route("/v1/jobs/:id", get(routes::jobs::get_job))
        .route("/v1/jobs/:id/stream", get(routes::stream::stream_job))
        .route("/v1/jobs/:id/cancel", post(routes::cancel::cancel_job))
        .route("/v1/jobs/:id/rerun", post(routes::rerun::rerun_job))
        .route("/v1/config/providers", post(routes::config::upsert_provider))
        .route("/v1/config/engine", post(routes::config::reconfigure_engine))
        .fallback(not_found)
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::not_found("no route matches this path")
}
