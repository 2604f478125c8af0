//! `GET /v1/jobs/{id}/stream` (spec §4.7, §6): resumable NDJSON stream.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Response;

use crate::app::AppState;
use crate::error::ApiError;
use crate::ndjson::ndjson_stream;
use crate::wire::StreamParams;

pub async fn stream_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
    Query(params): Query<StreamParams>,
) -> Result<Response, ApiError> {
    state.executor.store().get(&job_id).await.map_err(ApiError::from)?;
    let log = state
        .event_logs
        .ensure(state.executor.clone(), &job_id, None)
        .await;
    Ok(ndjson_stream(log, params.after_seq))
}
