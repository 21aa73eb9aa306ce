use axum::{
    extract::{rejection::JsonRejection, State},
    response::Response,
    Json,
};

use super::response::ResponseTemplate;
use crate::error::ApiError;
use crate::models::{ImageRequest, RenderOptions};
use crate::server::AppState;

/// Render an image from markup or an element tree
///
/// The body carries the element (markup string or element tree) and render
/// options. The response body is the raw SVG or PNG.
#[utoipa::path(
    post,
    path = "/api/image",
    request_body = ImageRequest,
    responses(
        (status = 200, description = "Rendered image (image/svg+xml when format is svg)", content_type = "image/png"),
        (status = 400, description = "Invalid request body or options"),
        (status = 500, description = "Rendering failed"),
        (status = 502, description = "A remote font or asset could not be fetched"),
    ),
    tag = "Image"
)]
pub async fn handle_image(
    State(state): State<AppState>,
    payload: Result<Json<ImageRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    validate_dimensions(&request.options, state.config.max_dimension)?;
    let template = ResponseTemplate::from_options(&request.options)?;

    let format = request.options.format;
    let artifact = state.pipeline.render(request).await?;

    tracing::info!(format = ?format, bytes = artifact.len(), "Rendered image");
    Ok(template.assemble(artifact))
}

/// Zero counts as absent; anything else must be within `1..=max`.
pub fn validate_dimensions(options: &RenderOptions, max: u32) -> Result<(), ApiError> {
    for (name, value) in [("width", options.width), ("height", options.height)] {
        if let Some(value) = value.filter(|v| *v > max) {
            return Err(ApiError::BadRequest(format!(
                "{name} {value} exceeds maximum of {max}"
            )));
        }
    }
    Ok(())
}
