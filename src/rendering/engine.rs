//! Contracts of the two rendering engines.
//!
//! Engine A lays out an element tree and produces an SVG document; engine B
//! turns an SVG document into PNG bytes. Both need a one-time bootstrap
//! before first use, driven by [`crate::services::EngineInitializer`].

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::error::EngineError;
use crate::models::{Dimensions, ElementNode, FontDescriptor};

/// Per-glyph asset callback used during layout (emoji images).
#[async_trait]
pub trait GlyphLoader: Send + Sync {
    /// Returns a `data:` URI for the grapheme cluster, or `None` to fall back
    /// to drawing it as text.
    async fn load_glyph(&self, segment: &str) -> Option<String>;
}

/// Inputs of one vectorization.
#[derive(Clone)]
pub struct VectorizeOptions {
    pub dimensions: Dimensions,
    pub fonts: Vec<FontDescriptor>,
    pub glyphs: Option<Arc<dyn GlyphLoader>>,
}

impl fmt::Debug for VectorizeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorizeOptions")
            .field("dimensions", &self.dimensions)
            .field("fonts", &self.fonts)
            .field("glyphs", &self.glyphs.is_some())
            .finish()
    }
}

/// Layout + vectorization engine.
#[async_trait]
pub trait LayoutEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// One-time setup; called at most once per process unless reset.
    async fn bootstrap(&self) -> Result<(), EngineError>;

    async fn vectorize(
        &self,
        tree: &ElementNode,
        options: VectorizeOptions,
    ) -> Result<String, EngineError>;
}

/// Which output dimension the raster is scaled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitTo {
    Width(u32),
    Height(u32),
}

impl From<Dimensions> for FitTo {
    /// Both fixed: either constraint is valid, width is used.
    fn from(dimensions: Dimensions) -> Self {
        match dimensions {
            Dimensions::Both { width, .. } | Dimensions::Width(width) => FitTo::Width(width),
            Dimensions::Height(height) => FitTo::Height(height),
        }
    }
}

/// Vector-to-raster engine.
#[async_trait]
pub trait RasterEngine: Send + Sync {
    fn name(&self) -> &'static str;

    async fn bootstrap(&self) -> Result<(), EngineError>;

    /// CPU bound; callers run it on a blocking thread.
    fn rasterize(&self, svg: &str, fit: FitTo) -> Result<Vec<u8>, EngineError>;
}
