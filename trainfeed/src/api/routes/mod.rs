//! API route modules.

pub mod health;
pub mod jobs;
pub mod logging;
pub mod solr;

use axum::Router;

use crate::api::server::AppState;

/// Create the control-plane router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(solr::router())
        .merge(jobs::router())
        .merge(health::router())
        .merge(logging::router())
        .with_state(state)
}
