pub mod emoji;
pub mod engine_init;
pub mod font_loader;
pub mod pipeline;

pub use emoji::{icon_code, EmojiCdn, EmojiLoader, EmojiProvider};
pub use engine_init::EngineInitializer;
pub use font_loader::{FontLoader, GoogleFontLoader};
pub use pipeline::RenderPipeline;
