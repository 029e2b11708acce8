use axum::{http::StatusCode, middleware, routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::Config,
    error::AppResult,
    middleware::request_id::{make_span_with_request_id, request_id_middleware},
    services::Recommender,
};

pub mod cache;
pub mod catalog;

/// Shared application state
pub struct AppState {
    pub recommender: Recommender,
}

impl AppState {
    pub fn new(recommender: Recommender) -> Self {
        Self { recommender }
    }

    /// Builds the production providers from configuration
    pub fn from_config(config: &Config) -> AppResult<Self> {
        Ok(Self::new(Recommender::from_config(config)?))
    }
}

/// Creates the application router with all routes
///
/// Catalog paths follow the media client's addon protocol: the user's
/// JSON config is the first path segment and extras are an optional
/// `key=value&...` segment before `.json`.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/reset-cache", get(cache::reset))
        .route("/:config/catalog/:media_type/:file", get(catalog::catalog))
        .route(
            "/:config/catalog/:media_type/:catalog_id/:extra",
            get(catalog::catalog_with_extra),
        )
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(make_span_with_request_id),
                )
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
