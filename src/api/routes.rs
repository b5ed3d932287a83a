//! Route table

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/images/generations", post(handlers::generate_images))
        .route(
            "/v1/batch",
            post(handlers::start_batch).get(handlers::batch_status),
        )
        .route("/v1/batch/files/:filename", get(handlers::batch_file))
        .route("/v1/batch/archive", post(handlers::package_batch))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
