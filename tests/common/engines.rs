//! Instrumented engine and loader doubles.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ogify::error::{EngineError, RenderError};
use ogify::models::{Dimensions, ElementNode, EmojiStyle};
use ogify::rendering::{FitTo, GlyphLoader, LayoutEngine, RasterEngine, VectorizeOptions};
use ogify::services::{EmojiProvider, FontLoader};

pub const MOCK_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"></svg>"#;
pub const MOCK_PNG: &[u8] = b"\x89PNG\r\n\x1a\nmock";

/// What the layout engine saw on its last call.
#[derive(Debug, Clone)]
pub struct VectorizeCall {
    pub tree: ElementNode,
    pub dimensions: Dimensions,
    pub font_names: Vec<String>,
    pub has_glyphs: bool,
}

#[derive(Default)]
pub struct MockLayout {
    pub bootstraps: AtomicUsize,
    pub vectorizes: AtomicUsize,
    pub fail_bootstrap: AtomicBool,
    pub bootstrap_delay: Option<Duration>,
    pub last_call: Mutex<Option<VectorizeCall>>,
}

impl MockLayout {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let layout = Self::default();
        layout.fail_bootstrap.store(true, Ordering::SeqCst);
        Arc::new(layout)
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            bootstrap_delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn bootstrap_count(&self) -> usize {
        self.bootstraps.load(Ordering::SeqCst)
    }

    pub fn vectorize_count(&self) -> usize {
        self.vectorizes.load(Ordering::SeqCst)
    }

    pub fn last_call(&self) -> VectorizeCall {
        self.last_call
            .lock()
            .unwrap()
            .clone()
            .expect("vectorize was not called")
    }
}

#[async_trait]
impl LayoutEngine for MockLayout {
    fn name(&self) -> &'static str {
        "layout"
    }

    async fn bootstrap(&self) -> Result<(), EngineError> {
        self.bootstraps.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.bootstrap_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_bootstrap.load(Ordering::SeqCst) {
            return Err(EngineError::Layout("bootstrap refused".to_string()));
        }
        Ok(())
    }

    async fn vectorize(
        &self,
        tree: &ElementNode,
        options: VectorizeOptions,
    ) -> Result<String, EngineError> {
        self.vectorizes.fetch_add(1, Ordering::SeqCst);
        *self.last_call.lock().unwrap() = Some(VectorizeCall {
            tree: tree.clone(),
            dimensions: options.dimensions,
            font_names: options.fonts.iter().map(|f| f.name.clone()).collect(),
            has_glyphs: options.glyphs.is_some(),
        });
        Ok(MOCK_SVG.to_string())
    }
}

#[derive(Default)]
pub struct MockRaster {
    pub bootstraps: AtomicUsize,
    pub rasterizes: AtomicUsize,
    pub fail_bootstrap: AtomicBool,
    pub last_fit: Mutex<Option<FitTo>>,
}

impl MockRaster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let raster = Self::default();
        raster.fail_bootstrap.store(true, Ordering::SeqCst);
        Arc::new(raster)
    }

    pub fn bootstrap_count(&self) -> usize {
        self.bootstraps.load(Ordering::SeqCst)
    }

    pub fn rasterize_count(&self) -> usize {
        self.rasterizes.load(Ordering::SeqCst)
    }

    pub fn last_fit(&self) -> Option<FitTo> {
        *self.last_fit.lock().unwrap()
    }
}

#[async_trait]
impl RasterEngine for MockRaster {
    fn name(&self) -> &'static str {
        "raster"
    }

    async fn bootstrap(&self) -> Result<(), EngineError> {
        self.bootstraps.fetch_add(1, Ordering::SeqCst);
        if self.fail_bootstrap.load(Ordering::SeqCst) {
            return Err(EngineError::Task("raster bootstrap refused".to_string()));
        }
        Ok(())
    }

    fn rasterize(&self, _svg: &str, fit: FitTo) -> Result<Vec<u8>, EngineError> {
        self.rasterizes.fetch_add(1, Ordering::SeqCst);
        *self.last_fit.lock().unwrap() = Some(fit);
        Ok(MOCK_PNG.to_vec())
    }
}

/// Returns fixed bytes and counts calls.
#[derive(Default)]
pub struct StaticFontLoader {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl StaticFontLoader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FontLoader for StaticFontLoader {
    async fn load_font(&self, family: &str, _weight: u16) -> Result<Vec<u8>, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RenderError::AssetFetch(format!("font {family}: unreachable")));
        }
        Ok(b"font-bytes".to_vec())
    }
}

struct NoGlyphs;

#[async_trait]
impl GlyphLoader for NoGlyphs {
    async fn load_glyph(&self, _segment: &str) -> Option<String> {
        None
    }
}

/// Records which styles were requested.
#[derive(Default)]
pub struct MockEmoji {
    pub requested: Mutex<Vec<EmojiStyle>>,
}

impl MockEmoji {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn requested(&self) -> Vec<EmojiStyle> {
        self.requested.lock().unwrap().clone()
    }
}

impl EmojiProvider for MockEmoji {
    fn loader(&self, style: EmojiStyle) -> Arc<dyn GlyphLoader> {
        self.requested.lock().unwrap().push(style);
        Arc::new(NoGlyphs)
    }
}
