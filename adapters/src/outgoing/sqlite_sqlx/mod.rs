pub mod project_repository;
pub mod schema;
pub mod tile_repository;

use std::path::Path;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use pixel_hawk_application::error::{AppError, AppResult};

/// Opens (creating if needed) the single-writer SQLite record store.
pub async fn connect_pool(database_path: &Path) -> AppResult<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(database_path)
        .create_if_missing(true)
        .foreign_keys(true);
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(|error| db_error("Failed to open record store", &error))
}

pub(crate) fn db_error(context: &str, error: &sqlx::Error) -> AppError {
    AppError::DatabaseError {
        message: format!("{context}: {error}"),
    }
}
