pub mod project_images;
pub mod tile_store;
