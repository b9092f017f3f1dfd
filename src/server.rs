use axum::{
    error_handling::HandleErrorLayer, http::StatusCode, response::IntoResponse, routing::get,
    BoxError, Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower::{timeout::error::Elapsed, ServiceBuilder};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::db::MovieRepo;
use crate::embedding::Embedder;
use crate::recommend::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub movies: Arc<dyn MovieRepo>,
    pub embedder: Arc<dyn Embedder>,
}

impl AppState {
    pub fn new(config: Config, movies: Arc<dyn MovieRepo>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            config: Arc::new(config),
            movies,
            embedder,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        .route("/", get(crate::recommend::ping))
        .route("/recomendar/:id", get(crate::recommend::recommend))
        .fallback(fallback_handler)
        .layer(axum::middleware::from_fn(crate::middleware::log_request))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(CompressionLayer::new())
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .timeout(timeout),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn fallback_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}

async fn handle_middleware_error(err: BoxError) -> ApiError {
    if err.is::<Elapsed>() {
        ApiError::Timeout
    } else {
        ApiError::Internal(err.to_string())
    }
}
