pub mod color;
pub mod coords;
pub mod error;
pub mod geo;
pub mod image;
pub mod palette;
pub mod record;
pub mod stats;
