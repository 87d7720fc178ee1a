//! Thumbnail cards sent with every play

pub mod fetch;
pub mod render;

pub use fetch::prepare_cover;
pub use render::{load_font, render_card, render_to_file, CardInfo};
