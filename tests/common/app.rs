//! Test application factory for integration tests.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

use ogify::models::{AppConfig, DefaultFontConfig};
use ogify::server::{build_router, AppState};
use ogify::services::{EngineInitializer, RenderPipeline};

use super::engines::{MockEmoji, MockLayout, MockRaster, StaticFontLoader};

/// Test application with router and direct access to the engine doubles
pub struct TestApp {
    router: axum::Router,
    pub layout: Arc<MockLayout>,
    pub raster: Arc<MockRaster>,
    pub fonts: Arc<StaticFontLoader>,
    pub emoji: Arc<MockEmoji>,
}

impl TestApp {
    /// Create a test application backed by instrumented engines
    pub fn new() -> Self {
        Self::with_engines(MockLayout::new(), MockRaster::new())
    }

    pub fn with_engines(layout: Arc<MockLayout>, raster: Arc<MockRaster>) -> Self {
        let fonts = StaticFontLoader::new();
        let emoji = MockEmoji::new();
        let pipeline = mock_pipeline(layout.clone(), raster.clone(), fonts.clone(), emoji.clone());
        let state = AppState::new(Arc::new(pipeline), Arc::new(AppConfig::default()));

        Self {
            router: build_router(state),
            layout,
            raster,
            fonts,
            emoji,
        }
    }

    /// Make a GET request to the given path
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(Request::get(path).body(Body::empty()).unwrap())
            .await
    }

    /// Make a POST request with JSON body
    pub async fn post_json(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::post(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.request(request).await
    }

    /// POST a render request to /api/image
    pub async fn render(&self, body: serde_json::Value) -> TestResponse {
        self.post_json("/api/image", &body.to_string()).await
    }

    /// Send a request to the router
    async fn request(&self, request: Request<Body>) -> TestResponse {
        send(&self.router, request).await
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Pipeline wired to the given doubles with the default font config.
pub fn mock_pipeline(
    layout: Arc<MockLayout>,
    raster: Arc<MockRaster>,
    fonts: Arc<StaticFontLoader>,
    emoji: Arc<MockEmoji>,
) -> RenderPipeline {
    let engines = Arc::new(EngineInitializer::new(layout, raster));
    RenderPipeline::new(engines, fonts, emoji, DefaultFontConfig::default())
}

/// Send a request through a router and buffer the response
pub async fn send(router: &axum::Router, request: Request<Body>) -> TestResponse {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("Request failed");

    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect body")
        .to_bytes()
        .to_vec();

    TestResponse {
        status,
        headers,
        body,
    }
}

/// Test response with convenience methods
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    /// Parse body as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).expect("Failed to parse JSON response")
    }

    /// Get body as string
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Check if response is a PNG image
    pub fn is_png(&self) -> bool {
        self.body.len() >= 8 && &self.body[0..8] == b"\x89PNG\r\n\x1a\n"
    }
}
