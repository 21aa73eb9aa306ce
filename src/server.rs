//! HTTP server setup and configuration.
//!
//! This module provides the router and application state used by both
//! the production server and integration tests.

use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::api;
use crate::models::{AppConfig, ImageRequest};
use crate::services::RenderPipeline;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RenderPipeline>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(pipeline: Arc<RenderPipeline>, config: Arc<AppConfig>) -> Self {
        Self { pipeline, config }
    }
}

/// Create application state with the production pipeline.
pub fn create_app_state(config: AppConfig) -> anyhow::Result<AppState> {
    let pipeline = RenderPipeline::from_config(&config)
        .map_err(|e| anyhow::anyhow!("Failed to create render pipeline: {e}"))?;

    Ok(AppState::new(Arc::new(pipeline), Arc::new(config)))
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "ogify API",
        description = "Open Graph image rendering from HTML-like markup",
        version = "0.1.0",
        license(name = "MIT")
    ),
    paths(api::handle_image),
    components(schemas(ImageRequest)),
    tags((name = "Image", description = "Image rendering"))
)]
pub struct ApiDoc;

/// Build the API router with all endpoints and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/image", post(api::handle_image))
        .route("/health", get(|| async { "OK" }))
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .fallback(|| async { StatusCode::NOT_FOUND })
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
