pub mod css;
pub mod engine;
pub mod fonts;
pub mod layout;
pub mod svg_to_png;
pub mod text;
pub mod vectorizer;

pub use engine::{FitTo, GlyphLoader, LayoutEngine, RasterEngine, VectorizeOptions};
pub use svg_to_png::ResvgRasterizer;
pub use vectorizer::FlexVectorizer;
