use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use super::EmojiStyle;

/// Application configuration loaded from config.yaml
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    /// Font fetched when a request supplies none
    pub default_font: DefaultFontConfig,

    /// CSS endpoint of the remote font service
    pub font_api_url: String,

    /// Per-style overrides of the emoji CDN base URL
    pub emoji_base_urls: HashMap<EmojiStyle, String>,

    /// Load system fonts as fallback for the layout engine
    pub load_system_fonts: bool,

    /// Re-compress PNG output with oxipng
    pub optimize_png: bool,

    /// Largest accepted width or height in pixels
    pub max_dimension: u32,

    /// Timeout for font, glyph and image fetches
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct DefaultFontConfig {
    pub family: String,
    #[serde(default = "default_font_weight")]
    pub weight: u16,
}

fn default_font_weight() -> u16 {
    600
}

impl Default for DefaultFontConfig {
    fn default() -> Self {
        Self {
            family: "Bitter".to_string(),
            weight: default_font_weight(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_font: DefaultFontConfig::default(),
            font_api_url: "https://fonts.googleapis.com/css2".to_string(),
            emoji_base_urls: HashMap::new(),
            load_system_fonts: true,
            optimize_png: false,
            max_dimension: 4096,
            fetch_timeout_secs: 10,
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file, falling back to defaults
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            tracing::info!("No config file configured, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str::<Self>(&content) {
                Ok(config) => {
                    tracing::info!(
                        path = %path.display(),
                        default_font = %config.default_font.family,
                        max_dimension = config.max_dimension,
                        "Loaded configuration"
                    );
                    config
                }
                Err(e) => {
                    tracing::warn!(%e, path = %path.display(), "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(%e, path = %path.display(), "Failed to read config, using defaults");
                Self::default()
            }
        }
    }

    /// Load configuration from the path in `CONFIG_FILE`, if set
    pub fn from_env() -> Self {
        let path = std::env::var("CONFIG_FILE").ok().map(std::path::PathBuf::from);
        Self::load(path.as_deref())
    }
}
