//! Job submission and status routes.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiJson, ApiResult, parse_json};
use crate::api::server::AppState;
use crate::domain::JobDescriptor;
use crate::job::JobSnapshot;
use crate::service::JobStatusView;

#[derive(Debug, Deserialize)]
pub struct JobIdRequest {
    pub job_id: u64,
}

#[derive(Debug, Deserialize)]
pub struct JobIdQuery {
    pub job_id: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub job_id: u64,
    pub message: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/submit_job", post(submit_job))
        .route("/get_job_status", get(get_job_status))
        .route("/cancel_job", post(cancel_job))
        .route("/jobs/{job_id}", get(get_job))
}

async fn submit_job(
    State(state): State<AppState>,
    ApiJson(descriptor): ApiJson<JobDescriptor>,
) -> ApiResult<(StatusCode, Json<SubmitJobResponse>)> {
    let job = state.service.submit_job(descriptor)?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitJobResponse {
            job_id: job.id(),
            message: format!("Job {} queued", job.id()),
        }),
    ))
}

/// The id comes from `?job_id=` when present, otherwise from a JSON body.
async fn get_job_status(
    State(state): State<AppState>,
    query: Result<Query<JobIdQuery>, QueryRejection>,
    body: Bytes,
) -> ApiResult<Json<JobStatusView>> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let job_id = match query.job_id {
        Some(id) => id,
        None if body.is_empty() => return Err(ApiError::bad_request("job_id is required")),
        None => parse_json::<JobIdRequest>(&body)?.job_id,
    };

    Ok(Json(state.service.job_status(job_id)?))
}

async fn cancel_job(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<JobIdRequest>,
) -> ApiResult<Json<()>> {
    state.service.cancel_job(request.job_id)?;
    Ok(Json(()))
}

/// Full detail for one job.
async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<u64>,
) -> ApiResult<Json<JobSnapshot>> {
    Ok(Json(state.service.job_snapshot(job_id)?))
}
