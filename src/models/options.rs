use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use super::element::{ElementNode, MAX_NESTING_DEPTH};

/// Canvas size used when neither width nor height is requested.
pub const DEFAULT_WIDTH: u32 = 1200;
pub const DEFAULT_HEIGHT: u32 = 630;

/// Weight assumed for a font descriptor that does not state one.
const DEFAULT_FONT_WEIGHT: u16 = 400;

/// Output format of a render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Svg,
    #[default]
    Png,
}

impl ImageFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ImageFormat::Svg => "image/svg+xml",
            ImageFormat::Png => "image/png",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "svg" => Ok(Self::Svg),
            "png" => Ok(Self::Png),
            other => Err(format!("unknown image format: {other}")),
        }
    }
}

/// Icon set used for emoji glyphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EmojiStyle {
    Twemoji,
    Openmoji,
    Blobmoji,
    Noto,
    Fluent,
    FluentFlat,
}

impl EmojiStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            EmojiStyle::Twemoji => "twemoji",
            EmojiStyle::Openmoji => "openmoji",
            EmojiStyle::Blobmoji => "blobmoji",
            EmojiStyle::Noto => "noto",
            EmojiStyle::Fluent => "fluent",
            EmojiStyle::FluentFlat => "fluentFlat",
        }
    }
}

impl fmt::Display for EmojiStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmojiStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "twemoji" => Ok(Self::Twemoji),
            "openmoji" => Ok(Self::Openmoji),
            "blobmoji" => Ok(Self::Blobmoji),
            "noto" => Ok(Self::Noto),
            "fluent" => Ok(Self::Fluent),
            "fluentFlat" | "fluent-flat" => Ok(Self::FluentFlat),
            other => Err(format!("unknown emoji style: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

/// A font supplied with a render request.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct FontDescriptor {
    /// Family name referenced by `fontFamily` styles.
    pub name: String,
    /// Raw TrueType/OpenType data; base64 on the wire.
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    #[serde(default = "default_font_weight")]
    pub weight: u16,
    #[serde(default)]
    pub style: FontStyle,
}

fn default_font_weight() -> u16 {
    DEFAULT_FONT_WEIGHT
}

impl fmt::Debug for FontDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontDescriptor")
            .field("name", &self.name)
            .field("data_len", &self.data.len())
            .field("weight", &self.weight)
            .field("style", &self.style)
            .finish()
    }
}

mod base64_bytes {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.trim())
            .map_err(serde::de::Error::custom)
    }
}

/// Caller options for one render.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOptions {
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub format: ImageFormat,
    #[serde(default)]
    pub fonts: Vec<FontDescriptor>,
    #[serde(default)]
    pub emoji: Option<EmojiStyle>,
    #[serde(default)]
    pub debug: bool,
    /// Extra response headers, applied after the defaults.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub status_text: Option<String>,
}

/// Markup string or prebuilt element tree.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ImageElement {
    Markup(String),
    Tree(ElementNode),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawImageElement {
    Markup(String),
    Tree(ElementNode),
}

impl<'de> Deserialize<'de> for ImageElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawImageElement::deserialize(deserializer)? {
            RawImageElement::Markup(markup) => Ok(Self::Markup(markup)),
            RawImageElement::Tree(tree) => {
                if tree.depth() > MAX_NESTING_DEPTH {
                    return Err(serde::de::Error::custom(format!(
                        "element tree nests deeper than {MAX_NESTING_DEPTH} levels"
                    )));
                }
                Ok(Self::Tree(tree))
            }
        }
    }
}

/// Caller-supplied render input.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ImageRequest {
    /// HTML-like markup (inline styles, flexbox layout) or an element tree.
    #[schema(value_type = Object)]
    pub element: ImageElement,
    /// width, height, format ("svg" | "png"), fonts, emoji, debug, headers,
    /// status, statusText.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub options: RenderOptions,
}

/// Target canvas size after defaulting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimensions {
    Both { width: u32, height: u32 },
    /// Height is inferred by the layout engine.
    Width(u32),
    /// Width is inferred by the layout engine.
    Height(u32),
}

impl Dimensions {
    /// Zero is treated as absent.
    pub fn resolve(width: Option<u32>, height: Option<u32>) -> Self {
        match (width.filter(|w| *w > 0), height.filter(|h| *h > 0)) {
            (Some(width), Some(height)) => Self::Both { width, height },
            (Some(width), None) => Self::Width(width),
            (None, Some(height)) => Self::Height(height),
            (None, None) => Self::Both {
                width: DEFAULT_WIDTH,
                height: DEFAULT_HEIGHT,
            },
        }
    }

    pub fn width(self) -> Option<u32> {
        match self {
            Self::Both { width, .. } | Self::Width(width) => Some(width),
            Self::Height(_) => None,
        }
    }

    pub fn height(self) -> Option<u32> {
        match self {
            Self::Both { height, .. } | Self::Height(height) => Some(height),
            Self::Width(_) => None,
        }
    }
}

/// Output of one render. Not cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedArtifact {
    Svg(String),
    Png(Vec<u8>),
}

impl RenderedArtifact {
    pub fn format(&self) -> ImageFormat {
        match self {
            RenderedArtifact::Svg(_) => ImageFormat::Svg,
            RenderedArtifact::Png(_) => ImageFormat::Png,
        }
    }

    pub fn content_type(&self) -> &'static str {
        self.format().content_type()
    }

    /// Body size in bytes.
    pub fn len(&self) -> usize {
        match self {
            RenderedArtifact::Svg(svg) => svg.len(),
            RenderedArtifact::Png(png) => png.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            RenderedArtifact::Svg(svg) => svg.into_bytes(),
            RenderedArtifact::Png(png) => png,
        }
    }
}
