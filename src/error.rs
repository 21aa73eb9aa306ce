use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Rendering error: {0}")]
    Render(#[from] RenderError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Fatal per-request failures. No partial artifact is ever returned.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Malformed markup: {0}")]
    MalformedMarkup(String),

    #[error("Engine initialization failed: {0}")]
    EngineInit(String),

    #[error("Asset fetch failed: {0}")]
    AssetFetch(String),

    #[error("Render engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Internal errors reported by the layout or raster engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0} engine used before initialization")]
    NotInitialized(&'static str),

    #[error("Layout error: {0}")]
    Layout(String),

    #[error("SVG parse error: {0}")]
    SvgParse(String),

    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Failed to allocate pixmap")]
    PixmapAllocation,

    #[error("PNG encode error: {0}")]
    PngEncode(String),

    #[error("Engine task failed: {0}")]
    Task(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) | ApiError::InvalidHeader(_) => StatusCode::BAD_REQUEST,
            ApiError::Render(RenderError::AssetFetch(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "status": status.as_u16(),
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
