pub mod image;
pub mod response;

pub use image::{handle_image, validate_dimensions, __path_handle_image};
pub use response::{assemble, ResponseTemplate};
