use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use std::sync::LazyLock;

use crate::error::RenderError;

/// Characters kept verbatim in the `family` query value.
const FAMILY: &AsciiSet = &NON_ALPHANUMERIC.remove(b' ').remove(b'-').remove(b'_');

static FONT_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"src: url\((.+?)\) format\('(opentype|truetype)'\)")
        .expect("font src pattern is valid")
});

/// Source of font binaries by family and weight.
#[async_trait]
pub trait FontLoader: Send + Sync {
    async fn load_font(&self, family: &str, weight: u16) -> Result<Vec<u8>, RenderError>;
}

/// Fetches TrueType/OpenType fonts through the Google Fonts CSS API.
pub struct GoogleFontLoader {
    client: reqwest::Client,
    css_url: String,
}

impl GoogleFontLoader {
    pub fn new(client: reqwest::Client, css_url: impl Into<String>) -> Self {
        Self {
            client,
            css_url: css_url.into(),
        }
    }

    /// Stylesheet URL for one family and weight; spaces become `+`.
    pub fn stylesheet_url(&self, family: &str, weight: u16) -> String {
        let family = utf8_percent_encode(family, FAMILY)
            .to_string()
            .replace(' ', "+");
        format!("{}?family={family}:wght@{weight}", self.css_url)
    }

    async fn fetch_text(&self, url: &str) -> Result<String, reqwest::Error> {
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, reqwest::Error> {
        let bytes = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}

/// First TrueType/OpenType source URL in a stylesheet.
pub fn font_source(css: &str) -> Option<&str> {
    FONT_SRC
        .captures(css)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_matches(|c| c == '"' || c == '\''))
}

#[async_trait]
impl FontLoader for GoogleFontLoader {
    async fn load_font(&self, family: &str, weight: u16) -> Result<Vec<u8>, RenderError> {
        let css_url = self.stylesheet_url(family, weight);
        let fetch_error = |e: reqwest::Error| RenderError::AssetFetch(format!("font {family}: {e}"));

        let css = self.fetch_text(&css_url).await.map_err(fetch_error)?;
        let font_url = font_source(&css).ok_or_else(|| {
            RenderError::AssetFetch(format!("font {family}: no font source in stylesheet"))
        })?;

        let data = self.fetch_bytes(font_url).await.map_err(fetch_error)?;
        tracing::info!(family, weight, bytes = data.len(), "Loaded font");
        Ok(data)
    }
}
