//! `POST /v1/jobs/{id}/cancel` (spec §5, §6): idempotent cancellation.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use engine::model::Job;

use crate::app::AppState;
use crate::error::ApiError;
use crate::wire::CancelRequest;

pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
    Json(body): Json<CancelRequest>,
) -> Result<Json<Job>, ApiError> {
    state
        .executor
        .cancel_job(&job_id, body.reason)
        .await
        .map(Json)
        .map_err(ApiError::from)
}
