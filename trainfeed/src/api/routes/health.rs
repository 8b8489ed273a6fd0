//! Health check route.

use std::collections::BTreeMap;

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::api::server::AppState;
use crate::domain::JobStatus;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Jobs waiting for a dispatcher worker.
    pub queued: usize,
    pub queued_jobs: Vec<u64>,
    pub jobs: BTreeMap<JobStatus, usize>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        queued: state.service.queue_len(),
        queued_jobs: state.service.queued_job_ids(),
        jobs: state.service.status_counts(),
    })
}
