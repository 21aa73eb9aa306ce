use async_trait::async_trait;
use resvg::usvg::{self, Transform};
use std::io::Cursor;
use std::sync::{Arc, OnceLock};
use tiny_skia::Pixmap;

use super::engine::{FitTo, RasterEngine};
use crate::error::EngineError;

/// Rendered during bootstrap to prove the raster path works.
const WARMUP_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="2" height="2"><rect width="2" height="2" fill="black"/></svg>"#;

/// Raster engine backed by resvg.
///
/// The output keeps the document's aspect ratio: the fit dimension is used
/// as-is and the other axis follows from the SVG's intrinsic size. Vector
/// documents from the layout engine carry text as outlines, so the font
/// database here starts empty.
pub struct ResvgRasterizer {
    /// Re-compress the encoded PNG with oxipng
    optimize: bool,
    /// Set once bootstrap succeeded
    fontdb: OnceLock<Arc<fontdb::Database>>,
}

impl ResvgRasterizer {
    pub fn new(optimize: bool) -> Self {
        Self {
            optimize,
            fontdb: OnceLock::new(),
        }
    }
}

impl Default for ResvgRasterizer {
    fn default() -> Self {
        Self::new(false)
    }
}

#[async_trait]
impl RasterEngine for ResvgRasterizer {
    fn name(&self) -> &'static str {
        "raster"
    }

    async fn bootstrap(&self) -> Result<(), EngineError> {
        let fontdb = tokio::task::spawn_blocking(|| {
            let fontdb = Arc::new(fontdb::Database::new());
            rasterize_svg(WARMUP_SVG, FitTo::Width(2), fontdb.clone())?;
            Ok::<_, EngineError>(fontdb)
        })
        .await
        .map_err(|e| EngineError::Task(e.to_string()))??;

        let _ = self.fontdb.set(fontdb);
        tracing::info!("Raster engine ready");
        Ok(())
    }

    fn rasterize(&self, svg: &str, fit: FitTo) -> Result<Vec<u8>, EngineError> {
        let fontdb = self
            .fontdb
            .get()
            .ok_or(EngineError::NotInitialized("raster"))?;

        let pixmap = rasterize_svg(svg, fit, fontdb.clone())?;
        let png_bytes = encode_png(&pixmap)?;

        tracing::debug!(
            width = pixmap.width(),
            height = pixmap.height(),
            bytes = png_bytes.len(),
            "Rasterized SVG"
        );

        if !self.optimize {
            return Ok(png_bytes);
        }

        // Fall back to the fast encoding if optimization fails
        let optimized =
            oxipng::optimize_from_memory(&png_bytes, &oxipng::Options::from_preset(2))
                .unwrap_or(png_bytes);
        Ok(optimized)
    }
}

/// Parse and rasterize SVG to an RGBA pixmap scaled to the fit constraint
fn rasterize_svg(
    svg: &str,
    fit: FitTo,
    fontdb: Arc<fontdb::Database>,
) -> Result<Pixmap, EngineError> {
    let options = usvg::Options {
        fontdb,
        ..Default::default()
    };
    let tree =
        usvg::Tree::from_str(svg, &options).map_err(|e| EngineError::SvgParse(e.to_string()))?;

    let size = tree.size();
    let (width, height, scale) = match fit {
        FitTo::Width(width) => {
            let scale = width as f32 / size.width();
            (width, (size.height() * scale).round() as u32, scale)
        }
        FitTo::Height(height) => {
            let scale = height as f32 / size.height();
            ((size.width() * scale).round() as u32, height, scale)
        }
    };
    if width == 0 || height == 0 {
        return Err(EngineError::InvalidDimensions { width, height });
    }

    let mut pixmap = Pixmap::new(width, height).ok_or(EngineError::PixmapAllocation)?;
    resvg::render(&tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    Ok(pixmap)
}

/// Encode a premultiplied pixmap as straight-alpha RGBA PNG.
fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>, EngineError> {
    let rgba: Vec<u8> = pixmap
        .pixels()
        .iter()
        .flat_map(|pixel| {
            let c = pixel.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();

    let mut buf = Cursor::new(Vec::new());
    {
        let mut encoder = png::Encoder::new(&mut buf, pixmap.width(), pixmap.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Default);
        let mut writer = encoder
            .write_header()
            .map_err(|e| EngineError::PngEncode(e.to_string()))?;
        writer
            .write_image_data(&rgba)
            .map_err(|e| EngineError::PngEncode(e.to_string()))?;
    }
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARD_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="1200" height="630" viewBox="0 0 1200 630"><rect width="1200" height="630" fill="#1e293b"/><rect x="100" y="100" width="200" height="100" fill="#f59e0b" fill-opacity="0.5"/></svg>"##;

    fn png_size(bytes: &[u8]) -> (u32, u32) {
        let decoder = png::Decoder::new(Cursor::new(bytes));
        let reader = decoder.read_info().unwrap();
        let info = reader.info();
        (info.width, info.height)
    }

    async fn ready_rasterizer(optimize: bool) -> ResvgRasterizer {
        let rasterizer = ResvgRasterizer::new(optimize);
        rasterizer.bootstrap().await.unwrap();
        rasterizer
    }

    #[test]
    fn test_rasterize_before_bootstrap_fails() {
        let rasterizer = ResvgRasterizer::default();
        let err = rasterizer.rasterize(CARD_SVG, FitTo::Width(100)).unwrap_err();
        assert!(matches!(err, EngineError::NotInitialized("raster")));
    }

    #[tokio::test]
    async fn test_fit_to_width_keeps_aspect_ratio() {
        let rasterizer = ready_rasterizer(false).await;
        let png = rasterizer.rasterize(CARD_SVG, FitTo::Width(400)).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!(png_size(&png), (400, 210));
    }

    #[tokio::test]
    async fn test_fit_to_height_keeps_aspect_ratio() {
        let rasterizer = ready_rasterizer(false).await;
        let png = rasterizer.rasterize(CARD_SVG, FitTo::Height(315)).unwrap();
        assert_eq!(png_size(&png), (600, 315));
    }

    #[tokio::test]
    async fn test_native_size() {
        let rasterizer = ready_rasterizer(true).await;
        let png = rasterizer.rasterize(CARD_SVG, FitTo::Width(1200)).unwrap();
        assert_eq!(png_size(&png), (1200, 630));
    }

    #[tokio::test]
    async fn test_invalid_svg_is_parse_error() {
        let rasterizer = ready_rasterizer(false).await;
        let err = rasterizer
            .rasterize("<not-svg", FitTo::Width(100))
            .unwrap_err();
        assert!(matches!(err, EngineError::SvgParse(_)));
    }

    #[test]
    fn test_encode_png_demultiplies_alpha() {
        let mut pixmap = Pixmap::new(1, 1).unwrap();
        pixmap.fill(tiny_skia::Color::from_rgba8(200, 100, 50, 128));
        let png = encode_png(&pixmap).unwrap();

        let decoder = png::Decoder::new(Cursor::new(png));
        let mut reader = decoder.read_info().unwrap();
        let mut buf = vec![0; reader.output_buffer_size()];
        reader.next_frame(&mut buf).unwrap();

        assert_eq!(buf[3], 128);
        assert!((buf[0] as i32 - 200).abs() <= 2);
        assert!((buf[1] as i32 - 100).abs() <= 2);
    }
}
