//! Mock asset server standing in for the font API and emoji CDNs.

use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

/// Wrapper around wiremock MockServer with convenience methods
pub struct MockAssetServer {
    pub server: MockServer,
}

impl MockAssetServer {
    /// Start a new mock HTTP server
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        Self { server }
    }

    /// Get the base URL of the mock server
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Get URL for a specific path
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.server.uri(), path)
    }

    /// Serve a stylesheet at `/css2` for `family` that points at `font_path`
    pub async fn mock_font(&self, family_param: &str, font_path: &str, data: &[u8]) {
        let css = format!(
            "@font-face {{\n  font-family: 'Mock';\n  font-style: normal;\n  src: url({}) format('truetype');\n}}\n",
            self.url_for(font_path)
        );
        Mock::given(method("GET"))
            .and(path("/css2"))
            .and(query_param("family", family_param))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(css)
                    .insert_header("content-type", "text/css"),
            )
            .mount(&self.server)
            .await;

        Mock::given(method("GET"))
            .and(path(font_path))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(data.to_vec())
                    .insert_header("content-type", "font/ttf"),
            )
            .mount(&self.server)
            .await;
    }

    /// Serve a stylesheet without any TrueType source
    pub async fn mock_woff2_only_css(&self) {
        Mock::given(method("GET"))
            .and(path("/css2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("src: url(/x.woff2) format('woff2');"),
            )
            .mount(&self.server)
            .await;
    }

    /// Serve an SVG document at `endpoint`
    pub async fn mock_svg(&self, endpoint: &str, svg: &str) {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(svg)
                    .insert_header("content-type", "image/svg+xml"),
            )
            .mount(&self.server)
            .await;
    }

    /// Mock an endpoint that returns an error
    pub async fn mock_error(&self, endpoint: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }
}
