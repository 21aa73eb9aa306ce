pub mod config;
pub mod element;
pub mod options;

pub use config::{AppConfig, DefaultFontConfig};
pub use element::{Child, ElementNode, Props, StyleMap, MAX_NESTING_DEPTH};
pub use options::{
    Dimensions, EmojiStyle, FontDescriptor, FontStyle, ImageElement, ImageFormat, ImageRequest,
    RenderOptions, RenderedArtifact, DEFAULT_HEIGHT, DEFAULT_WIDTH,
};
