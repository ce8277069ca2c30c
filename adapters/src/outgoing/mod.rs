pub mod fs_store;
pub mod http_reqwest;
pub mod png_image;
pub mod sqlite_sqlx;
