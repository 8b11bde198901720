pub mod params;
pub mod config;
pub mod images;

pub use params::*;
pub use config::EngineConfig;
pub use images::{read_images, read_probabilities, write_images};
