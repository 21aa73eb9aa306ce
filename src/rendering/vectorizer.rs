use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures_util::future::join_all;
use resvg::usvg;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};

use super::engine::{GlyphLoader, LayoutEngine, VectorizeOptions};
use super::fonts::{register_fonts, FontMetrics};
use super::layout::{layout_document, paint, LayoutBox, PaintResources, StyledElement};
use crate::error::EngineError;
use crate::models::ElementNode;

/// Largest canvas side the layout engine will infer.
const MAX_CANVAS_SIDE: u32 = 16384;

/// Layout engine: taffy flexbox layout measured with the request's fonts,
/// SVG painting and text outlining.
///
/// The emitted document is re-serialized through usvg, which converts all
/// text to paths using the request's fonts. The result renders identically
/// without any fonts installed.
pub struct FlexVectorizer {
    load_system_fonts: bool,
    client: reqwest::Client,
    /// Fonts shared by every request, set by bootstrap
    base_fonts: OnceLock<Arc<fontdb::Database>>,
}

impl FlexVectorizer {
    pub fn new(load_system_fonts: bool, client: reqwest::Client) -> Self {
        Self {
            load_system_fonts,
            client,
            base_fonts: OnceLock::new(),
        }
    }

    async fn fetch_images(&self, sources: BTreeSet<String>) -> HashMap<String, String> {
        let fetches = sources.into_iter().map(|url| async move {
            let result = self.fetch_image(&url).await;
            (url, result)
        });

        join_all(fetches)
            .await
            .into_iter()
            .filter_map(|(url, result)| match result {
                Ok(data_uri) => Some((url, data_uri)),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Failed to fetch image");
                    None
                }
            })
            .collect()
    }

    async fn fetch_image(&self, url: &str) -> Result<String, reqwest::Error> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_string())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or_else(|| guess_mime(url).to_string());
        let bytes = response.bytes().await?;

        tracing::debug!(url = %url, mime = %mime, bytes = bytes.len(), "Fetched image");
        Ok(format!("data:{mime};base64,{}", STANDARD.encode(&bytes)))
    }
}

fn guess_mime(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
    if path.ends_with(".svg") {
        "image/svg+xml"
    } else if path.ends_with(".jpg") || path.ends_with(".jpeg") {
        "image/jpeg"
    } else if path.ends_with(".gif") {
        "image/gif"
    } else if path.ends_with(".webp") {
        "image/webp"
    } else {
        "image/png"
    }
}

/// Resolve each distinct cluster once.
async fn load_glyphs(loader: &dyn GlyphLoader, clusters: BTreeSet<String>) -> HashMap<String, String> {
    let loads = clusters.into_iter().map(|cluster| async move {
        let uri = loader.load_glyph(&cluster).await;
        (cluster, uri)
    });

    join_all(loads)
        .await
        .into_iter()
        .filter_map(|(cluster, uri)| uri.map(|uri| (cluster, uri)))
        .collect()
}

#[async_trait]
impl LayoutEngine for FlexVectorizer {
    fn name(&self) -> &'static str {
        "layout"
    }

    async fn bootstrap(&self) -> Result<(), EngineError> {
        let load_system_fonts = self.load_system_fonts;
        let fontdb = tokio::task::spawn_blocking(move || {
            let mut fontdb = fontdb::Database::new();
            if load_system_fonts {
                fontdb.load_system_fonts();
            }
            fontdb
        })
        .await
        .map_err(|e| EngineError::Task(e.to_string()))?;

        tracing::info!(faces = fontdb.len(), "Layout engine ready");
        let _ = self.base_fonts.set(Arc::new(fontdb));
        Ok(())
    }

    async fn vectorize(
        &self,
        tree: &ElementNode,
        options: VectorizeOptions,
    ) -> Result<String, EngineError> {
        let base = self
            .base_fonts
            .get()
            .cloned()
            .ok_or(EngineError::NotInitialized("layout"))?;

        let styled = StyledElement::from_tree(tree);
        let glyphs = match &options.glyphs {
            Some(loader) => load_glyphs(loader.as_ref(), styled.emoji_clusters()).await,
            None => HashMap::new(),
        };
        let images = self.fetch_images(styled.remote_images()).await;

        let VectorizeOptions {
            dimensions, fonts, ..
        } = options;
        tokio::task::spawn_blocking(move || {
            let mut fontdb = (*base).clone();
            let families = register_fonts(&mut fontdb, &fonts);
            let (layout, width, height) = {
                let mut metrics = FontMetrics::new(&fontdb, &families);
                layout_document(&styled, dimensions, &mut metrics)?
            };
            let resources = PaintResources {
                families,
                glyphs,
                images,
            };
            vectorize_blocking(&layout, width, height, &resources, fontdb)
        })
        .await
        .map_err(|e| EngineError::Task(e.to_string()))?
    }
}

fn vectorize_blocking(
    layout: &LayoutBox,
    width: u32,
    height: u32,
    resources: &PaintResources,
    fontdb: fontdb::Database,
) -> Result<String, EngineError> {
    if width > MAX_CANVAS_SIDE || height > MAX_CANVAS_SIDE {
        return Err(EngineError::Layout(format!(
            "canvas {width}x{height} exceeds {MAX_CANVAS_SIDE}px"
        )));
    }

    let svg = paint(layout, width, height, resources);
    tracing::debug!(width, height, bytes = svg.len(), "Painted document");

    let options = usvg::Options {
        fontdb: Arc::new(fontdb),
        ..Default::default()
    };
    let tree =
        usvg::Tree::from_str(&svg, &options).map_err(|e| EngineError::SvgParse(e.to_string()))?;
    Ok(tree.to_string(&usvg::WriteOptions::default()))
}
