use std::sync::Arc;
use std::time::Duration;

use crate::error::{EngineError, RenderError};
use crate::markup;
use crate::models::{
    AppConfig, DefaultFontConfig, Dimensions, ElementNode, FontDescriptor, FontStyle,
    ImageElement, ImageFormat, ImageRequest, RenderedArtifact, MAX_NESTING_DEPTH,
};
use crate::rendering::{FitTo, FlexVectorizer, ResvgRasterizer, VectorizeOptions};
use crate::services::{EmojiCdn, EmojiProvider, EngineInitializer, FontLoader, GoogleFontLoader};

/// Turns one image request into a rendered artifact.
///
/// Holds no per-request state; the only shared mutable state lives in the
/// engine initializer.
pub struct RenderPipeline {
    engines: Arc<EngineInitializer>,
    font_loader: Arc<dyn FontLoader>,
    emoji: Arc<dyn EmojiProvider>,
    default_font: DefaultFontConfig,
}

impl RenderPipeline {
    pub fn new(
        engines: Arc<EngineInitializer>,
        font_loader: Arc<dyn FontLoader>,
        emoji: Arc<dyn EmojiProvider>,
        default_font: DefaultFontConfig,
    ) -> Self {
        Self {
            engines,
            font_loader,
            emoji,
            default_font,
        }
    }

    /// Production wiring: built-in engines and CDN-backed loaders.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent(concat!("ogify/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let engines = Arc::new(EngineInitializer::new(
            Arc::new(FlexVectorizer::new(config.load_system_fonts, client.clone())),
            Arc::new(ResvgRasterizer::new(config.optimize_png)),
        ));
        let font_loader = Arc::new(GoogleFontLoader::new(
            client.clone(),
            config.font_api_url.clone(),
        ));
        let emoji = Arc::new(EmojiCdn::new(client, config.emoji_base_urls.clone()));

        Ok(Self::new(
            engines,
            font_loader,
            emoji,
            config.default_font.clone(),
        ))
    }

    pub fn engines(&self) -> &Arc<EngineInitializer> {
        &self.engines
    }

    /// Render a request. Every failure is fatal; no partial artifact is
    /// returned.
    pub async fn render(&self, request: ImageRequest) -> Result<RenderedArtifact, RenderError> {
        let ImageRequest { element, options } = request;

        self.engines.ensure_ready().await?;

        let tree = resolve_tree(element)?;
        if options.debug {
            tracing::debug!(
                tree = %serde_json::to_string(&tree).unwrap_or_default(),
                "Element tree"
            );
        }

        let dimensions = Dimensions::resolve(options.width, options.height);
        let fonts = if options.fonts.is_empty() {
            vec![self.default_font().await?]
        } else {
            options.fonts
        };
        let glyphs = options.emoji.map(|style| self.emoji.loader(style));

        tracing::debug!(
            ?dimensions,
            fonts = fonts.len(),
            emoji = ?options.emoji,
            format = ?options.format,
            "Vectorizing"
        );
        let svg = self
            .engines
            .layout()
            .vectorize(
                &tree,
                VectorizeOptions {
                    dimensions,
                    fonts,
                    glyphs,
                },
            )
            .await?;

        if options.format == ImageFormat::Svg {
            return Ok(RenderedArtifact::Svg(svg));
        }

        let raster = Arc::clone(self.engines.raster());
        let fit = FitTo::from(dimensions);
        let png = tokio::task::spawn_blocking(move || raster.rasterize(&svg, fit))
            .await
            .map_err(|e| EngineError::Task(e.to_string()))??;

        Ok(RenderedArtifact::Png(png))
    }

    /// Fetched from the font loader on every render that supplies no fonts.
    async fn default_font(&self) -> Result<FontDescriptor, RenderError> {
        let DefaultFontConfig { family, weight } = &self.default_font;
        let data = self.font_loader.load_font(family, *weight).await?;

        Ok(FontDescriptor {
            name: family.clone(),
            data,
            weight: *weight,
            style: FontStyle::Normal,
        })
    }
}

fn resolve_tree(element: ImageElement) -> Result<ElementNode, RenderError> {
    match element {
        ImageElement::Tree(tree) if tree.depth() > MAX_NESTING_DEPTH => Err(
            RenderError::MalformedMarkup(format!(
                "element tree nests deeper than {MAX_NESTING_DEPTH} levels"
            )),
        ),
        ImageElement::Tree(tree) => Ok(tree),
        ImageElement::Markup(markup) => markup::build_tree(&markup).ok_or_else(|| {
            RenderError::MalformedMarkup("markup did not produce an element tree".to_string())
        }),
    }
}
