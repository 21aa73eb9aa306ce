//! Markup fragment to element tree compilation.

pub mod builder;
pub mod stream;
pub mod style;

pub use builder::{MarkupEvent, TreeBuilder, TreeError};
pub use stream::{build_tree, try_build_tree, ROOT_STYLE};
pub use style::parse_style;
