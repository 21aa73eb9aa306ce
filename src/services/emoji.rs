use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::EmojiStyle;
use crate::rendering::GlyphLoader;

const ZWJ: char = '\u{200D}';
const VARIATION_SELECTOR: char = '\u{FE0F}';

/// Supplies the per-request glyph callback for an emoji style.
pub trait EmojiProvider: Send + Sync {
    fn loader(&self, style: EmojiStyle) -> Arc<dyn GlyphLoader>;
}

/// Icon file code of a grapheme cluster: lowercase hex code points joined
/// by `-`. The variation selector is dropped unless the cluster is a ZWJ
/// sequence.
pub fn icon_code(segment: &str) -> String {
    let keep_selector = segment.contains(ZWJ);
    segment
        .chars()
        .filter(|c| keep_selector || *c != VARIATION_SELECTOR)
        .map(|c| format!("{:x}", c as u32))
        .collect::<Vec<_>>()
        .join("-")
}

fn default_base(style: EmojiStyle) -> &'static str {
    match style {
        EmojiStyle::Twemoji => "https://cdnjs.cloudflare.com/ajax/libs/twemoji/14.0.2/svg/",
        EmojiStyle::Openmoji => "https://cdn.jsdelivr.net/npm/@svgmoji/openmoji@2.0.0/svg/",
        EmojiStyle::Blobmoji => "https://cdn.jsdelivr.net/npm/@svgmoji/blob@2.0.0/svg/",
        EmojiStyle::Noto => {
            "https://cdn.jsdelivr.net/gh/svgmoji/svgmoji/packages/svgmoji__noto/svg/"
        }
        EmojiStyle::Fluent | EmojiStyle::FluentFlat => {
            "https://cdn.jsdelivr.net/gh/shuding/fluentui-emoji-unicode/assets/"
        }
    }
}

fn file_name(style: EmojiStyle, code: &str) -> String {
    match style {
        EmojiStyle::Twemoji => format!("{code}.svg"),
        EmojiStyle::Openmoji | EmojiStyle::Blobmoji | EmojiStyle::Noto => {
            format!("{}.svg", code.to_uppercase())
        }
        EmojiStyle::Fluent => format!("{code}_color.svg"),
        EmojiStyle::FluentFlat => format!("{code}_flat.svg"),
    }
}

/// Emoji SVGs from public CDNs, one base URL per style.
#[derive(Clone)]
pub struct EmojiCdn {
    client: reqwest::Client,
    bases: Arc<HashMap<EmojiStyle, String>>,
}

impl EmojiCdn {
    /// `overrides` replaces the default base URL of individual styles.
    pub fn new(client: reqwest::Client, overrides: HashMap<EmojiStyle, String>) -> Self {
        Self {
            client,
            bases: Arc::new(overrides),
        }
    }

    pub fn glyph_url(&self, style: EmojiStyle, segment: &str) -> String {
        let base = self
            .bases
            .get(&style)
            .map(String::as_str)
            .unwrap_or_else(|| default_base(style));
        let separator = if base.ends_with('/') { "" } else { "/" };
        format!("{base}{separator}{}", file_name(style, &icon_code(segment)))
    }

    /// Fetch the glyph as a `data:image/svg+xml` URI.
    pub async fn fetch(&self, style: EmojiStyle, segment: &str) -> Result<String, reqwest::Error> {
        let url = self.glyph_url(style, segment);
        let body = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        tracing::debug!(url = %url, bytes = body.len(), "Fetched emoji glyph");
        Ok(format!("data:image/svg+xml;base64,{}", STANDARD.encode(&body)))
    }
}

impl EmojiProvider for EmojiCdn {
    fn loader(&self, style: EmojiStyle) -> Arc<dyn GlyphLoader> {
        Arc::new(EmojiLoader {
            cdn: self.clone(),
            style,
        })
    }
}

/// Glyph loader bound to one emoji style.
pub struct EmojiLoader {
    cdn: EmojiCdn,
    style: EmojiStyle,
}

#[async_trait]
impl GlyphLoader for EmojiLoader {
    async fn load_glyph(&self, segment: &str) -> Option<String> {
        match self.cdn.fetch(self.style, segment).await {
            Ok(uri) => Some(uri),
            Err(e) => {
                tracing::warn!(style = %self.style, error = %e, "Emoji glyph unavailable, drawing as text");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cdn() -> EmojiCdn {
        EmojiCdn::new(reqwest::Client::new(), HashMap::new())
    }

    #[test]
    fn test_icon_code_strips_variation_selector() {
        assert_eq!(icon_code("❤️"), "2764");
        assert_eq!(icon_code("👋"), "1f44b");
        assert_eq!(icon_code("👍🏽"), "1f44d-1f3fd");
    }

    #[test]
    fn test_icon_code_keeps_selector_in_zwj_sequence() {
        assert_eq!(icon_code("🏳️\u{200D}🌈"), "1f3f3-fe0f-200d-1f308");
    }

    #[test]
    fn test_glyph_urls_per_style() {
        let cdn = cdn();
        assert_eq!(
            cdn.glyph_url(EmojiStyle::Twemoji, "👋"),
            "https://cdnjs.cloudflare.com/ajax/libs/twemoji/14.0.2/svg/1f44b.svg"
        );
        assert_eq!(
            cdn.glyph_url(EmojiStyle::Openmoji, "👋"),
            "https://cdn.jsdelivr.net/npm/@svgmoji/openmoji@2.0.0/svg/1F44B.svg"
        );
        assert_eq!(
            cdn.glyph_url(EmojiStyle::Noto, "👋"),
            "https://cdn.jsdelivr.net/gh/svgmoji/svgmoji/packages/svgmoji__noto/svg/1F44B.svg"
        );
        assert_eq!(
            cdn.glyph_url(EmojiStyle::Fluent, "👋"),
            "https://cdn.jsdelivr.net/gh/shuding/fluentui-emoji-unicode/assets/1f44b_color.svg"
        );
        assert_eq!(
            cdn.glyph_url(EmojiStyle::FluentFlat, "👋"),
            "https://cdn.jsdelivr.net/gh/shuding/fluentui-emoji-unicode/assets/1f44b_flat.svg"
        );
    }

    #[test]
    fn test_base_override() {
        let overrides = HashMap::from([(EmojiStyle::Blobmoji, "http://mirror.test/blob".to_string())]);
        let cdn = EmojiCdn::new(reqwest::Client::new(), overrides);
        assert_eq!(
            cdn.glyph_url(EmojiStyle::Blobmoji, "😀"),
            "http://mirror.test/blob/1F600.svg"
        );
    }
}
