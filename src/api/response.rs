//! HTTP response assembly for rendered artifacts.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Response,
};
use hyper::ext::ReasonPhrase;

use crate::error::ApiError;
use crate::models::{RenderOptions, RenderedArtifact};

pub const CACHE_CONTROL_IMMUTABLE: &str = "public, immutable, no-transform, max-age=31536000";
pub const CACHE_CONTROL_DEBUG: &str = "no-cache, no-store";

/// Status, reason and headers derived from the caller's options.
///
/// Built before rendering so invalid options fail fast.
#[derive(Debug, Clone)]
pub struct ResponseTemplate {
    status: StatusCode,
    reason: Option<ReasonPhrase>,
    cache_control: &'static str,
    headers: HeaderMap,
}

impl ResponseTemplate {
    pub fn from_options(options: &RenderOptions) -> Result<Self, ApiError> {
        let status = match options.status.filter(|code| *code != 0) {
            Some(code) => StatusCode::from_u16(code)
                .map_err(|_| ApiError::BadRequest(format!("invalid status code {code}")))?,
            None => StatusCode::OK,
        };

        let reason = options
            .status_text
            .as_ref()
            .map(|text| {
                ReasonPhrase::try_from(text.clone())
                    .map_err(|_| ApiError::BadRequest(format!("invalid status text {text:?}")))
            })
            .transpose()?;

        let mut headers = HeaderMap::new();
        for (name, value) in &options.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ApiError::InvalidHeader(format!("invalid header name {name:?}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| ApiError::InvalidHeader(format!("invalid value for {name}")))?;
            headers.insert(header_name, header_value);
        }

        Ok(Self {
            status,
            reason,
            cache_control: if options.debug {
                CACHE_CONTROL_DEBUG
            } else {
                CACHE_CONTROL_IMMUTABLE
            },
            headers,
        })
    }

    /// Defaults first, then caller headers on top.
    pub fn assemble(self, artifact: RenderedArtifact) -> Response {
        let content_type = artifact.content_type();
        let mut response = Response::new(Body::from(artifact.into_bytes()));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(self.cache_control),
        );
        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }

        if let Some(reason) = self.reason {
            response.extensions_mut().insert(reason);
        }
        response
    }
}

/// One-shot form of [`ResponseTemplate`].
pub fn assemble(artifact: RenderedArtifact, options: &RenderOptions) -> Result<Response, ApiError> {
    Ok(ResponseTemplate::from_options(options)?.assemble(artifact))
}
