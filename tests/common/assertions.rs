//! Assertion helpers for tests.

use axum::http::StatusCode;
use pretty_assertions::assert_eq;

use super::app::TestResponse;

/// Assert response has expected status code
pub fn assert_status(response: &TestResponse, expected: StatusCode) {
    assert_eq!(
        response.status,
        expected,
        "Expected status {}, got {}. Body: {}",
        expected,
        response.status,
        response.text()
    );
}

/// Assert response is OK (200)
pub fn assert_ok(response: &TestResponse) {
    assert_status(response, StatusCode::OK);
}

/// Assert response is a PNG image with the PNG content type
pub fn assert_png(response: &TestResponse) {
    assert_ok(response);
    assert!(
        response.is_png(),
        "Expected PNG image, got {} bytes starting with {:?}",
        response.body.len(),
        &response.body[..8.min(response.body.len())]
    );
    assert_eq!(response.header("content-type"), Some("image/png"));
}

/// Assert response is an SVG document with the SVG content type
pub fn assert_svg(response: &TestResponse) {
    assert_ok(response);
    assert_eq!(response.header("content-type"), Some("image/svg+xml"));
    assert!(
        response.text().contains("<svg"),
        "Expected SVG body, got: {}",
        response.text()
    );
}

/// Assert a JSON error body with the given status
pub fn assert_json_error(response: &TestResponse, expected: StatusCode) {
    assert_status(response, expected);
    let json: serde_json::Value = response.json();
    assert_eq!(
        json["status"].as_u64(),
        Some(expected.as_u16() as u64),
        "Expected JSON status {}, got {:?}",
        expected,
        json
    );
    assert!(json["error"].is_string(), "Expected error message in {json}");
}

/// Decode PNG dimensions
pub fn png_size(bytes: &[u8]) -> (u32, u32) {
    let decoder = png::Decoder::new(std::io::Cursor::new(bytes));
    let reader = decoder.read_info().expect("Invalid PNG");
    let info = reader.info();
    (info.width, info.height)
}
