//! Runtime log filter routes.

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiJson, ApiResult};
use crate::api::server::AppState;
use crate::logging::{LoggingConfig, available_modules};

#[derive(Debug, Deserialize)]
pub struct UpdateLogFilterRequest {
    pub filter: String,
}

#[derive(Debug, Serialize)]
pub struct LoggingConfigResponse {
    pub filter: String,
    pub available_modules: Vec<ModuleInfo>,
}

#[derive(Debug, Serialize)]
pub struct ModuleInfo {
    pub name: String,
    pub description: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/logging", get(get_logging_config).put(update_logging_config))
}

fn logging_config(state: &AppState) -> ApiResult<&LoggingConfig> {
    state
        .logging_config
        .as_deref()
        .ok_or_else(|| ApiError::internal("Logging configuration not available"))
}

fn response(filter: String) -> LoggingConfigResponse {
    let modules = available_modules()
        .into_iter()
        .map(|(name, desc)| ModuleInfo {
            name: name.to_string(),
            description: desc.to_string(),
        })
        .collect();

    LoggingConfigResponse {
        filter,
        available_modules: modules,
    }
}

async fn get_logging_config(State(state): State<AppState>) -> ApiResult<Json<LoggingConfigResponse>> {
    let filter = logging_config(&state)?.get_filter();
    Ok(Json(response(filter)))
}

async fn update_logging_config(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<UpdateLogFilterRequest>,
) -> ApiResult<Json<LoggingConfigResponse>> {
    logging_config(&state)?.set_filter(&request.filter)?;
    Ok(Json(response(request.filter)))
}
