//! Solr connection routes.

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiJson, ApiResult};
use crate::api::server::AppState;
use crate::domain::connection::de_port;

#[derive(Debug, Deserialize)]
pub struct RegisterSolrRequest {
    pub host: String,
    #[serde(deserialize_with = "de_port")]
    pub port: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterSolrResponse {
    pub solr_id: u64,
    pub message: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/register_solr", post(register_solr))
}

async fn register_solr(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterSolrRequest>,
) -> ApiResult<(StatusCode, Json<RegisterSolrResponse>)> {
    let connection = state
        .service
        .register_connection(&request.host, &request.port)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterSolrResponse {
            solr_id: connection.id,
            message: format!("Registered Solr at {}", connection.base_url()),
        }),
    ))
}
