//! Server integration tests that test the actual server behavior.
//!
//! These tests start a real TCP server and verify what only shows up on
//! the wire: custom reason phrases and full renders through the built-in
//! engines.

mod common;

use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use common::app::mock_pipeline;
use common::{png_size, MockAssetServer, MockEmoji, MockLayout, MockRaster, StaticFontLoader};
use ogify::models::AppConfig;
use ogify::server::{build_router, create_app_state, AppState};

/// Serve a router on an available port and return the port number.
async fn serve(app: axum::Router) -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    port
}

async fn start_mock_server() -> u16 {
    let pipeline = mock_pipeline(
        MockLayout::new(),
        MockRaster::new(),
        StaticFontLoader::new(),
        MockEmoji::new(),
    );
    let state = AppState::new(Arc::new(pipeline), Arc::new(AppConfig::default()));
    serve(build_router(state)).await
}

/// Send a JSON POST over a raw connection and return the full response.
async fn post_raw(port: u16, path: &str, body: &str) -> Vec<u8> {
    let mut stream = TcpStream::connect(format!("127.0.0.1:{port}"))
        .await
        .expect("Failed to connect");

    let request = format!(
        "POST {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream
        .write_all(request.as_bytes())
        .await
        .expect("Failed to write request");

    let mut response = Vec::new();
    stream
        .read_to_end(&mut response)
        .await
        .expect("Failed to read response");
    response
}

/// Status line and headers of a raw response.
fn head(response: &[u8]) -> String {
    let end = response
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("Response has no header terminator");
    String::from_utf8_lossy(&response[..end]).to_string()
}

#[tokio::test]
async fn test_custom_status_text_reaches_the_wire() {
    let port = start_mock_server().await;

    let response = post_raw(
        port,
        "/api/image",
        r#"{"element":"<p>hi</p>","options":{"status":201,"statusText":"Rendered"}}"#,
    )
    .await;
    let head = head(&response);

    assert!(
        head.starts_with("HTTP/1.1 201 Rendered"),
        "Unexpected status line: {head}"
    );
}

#[tokio::test]
async fn test_default_reason_phrase_without_status_text() {
    let port = start_mock_server().await;

    let response = post_raw(port, "/api/image", r#"{"element":"<p>hi</p>"}"#).await;
    let head = head(&response);

    assert!(head.starts_with("HTTP/1.1 200 OK"), "Unexpected status line: {head}");
    assert!(head.to_lowercase().contains("content-type: image/png"));
}

#[tokio::test]
async fn test_end_to_end_png_with_builtin_engines() {
    let assets = MockAssetServer::start().await;
    assets
        .mock_font("Bitter:wght@600", "/fonts/bitter.ttf", b"not a real font")
        .await;

    let config = AppConfig {
        font_api_url: assets.url_for("/css2"),
        load_system_fonts: false,
        ..AppConfig::default()
    };
    let state = create_app_state(config).expect("Failed to create app state");
    let port = serve(build_router(state)).await;

    let element = r#"<div style="display:flex;width:100%;height:100%;background-color:#1e293b;align-items:center;justify-content:center"><h1 style="color:white">Hello</h1></div>"#;
    let response = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/api/image"))
        .header("content-type", "application/json")
        .body(serde_json::json!({ "element": element }).to_string())
        .send()
        .await
        .expect("Request failed");

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "image/png"
    );
    let png = response.bytes().await.expect("Failed to read body");
    assert_eq!(png_size(&png), (1200, 630));
}
