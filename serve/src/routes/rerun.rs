//! `POST /v1/jobs/{id}/rerun` (spec §4.5, §6).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::{http::StatusCode, Json};

use crate::app::AppState;
use crate::error::ApiError;
use crate::wire::RerunRequest;

pub async fn rerun_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
    Json(body): Json<RerunRequest>,
) -> Result<Response, ApiError> {
    let job = state
        .executor
        .rerun_job(&job_id, body.from_step_id, body.reuse_upstream, body.override_input)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(job)).into_response())
}
