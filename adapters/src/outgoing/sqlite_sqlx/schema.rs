//! Record store schema. The tables carry the consolidated names; creation
//! is idempotent so startup can always run it.

use sqlx::SqlitePool;

use pixel_hawk_application::error::AppResult;

use super::db_error;

const STATEMENTS: &[&str] = &[
    r"CREATE TABLE IF NOT EXISTS person (
        id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
        name VARCHAR(255) NOT NULL,
        discord_id BIGINT,
        access INT NOT NULL DEFAULT 0,
        watched_tiles_count INT NOT NULL DEFAULT 0,
        active_projects_count INT NOT NULL DEFAULT 0
    )",
    r#"CREATE UNIQUE INDEX IF NOT EXISTS uid_person_discord ON person ("discord_id")"#,
    r"CREATE TABLE IF NOT EXISTS project (
        id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
        name VARCHAR(255) NOT NULL,
        state SMALLINT NOT NULL DEFAULT 0,
        x INT NOT NULL DEFAULT 0,
        y INT NOT NULL DEFAULT 0,
        width INT NOT NULL DEFAULT 0,
        height INT NOT NULL DEFAULT 0,
        first_seen INT NOT NULL DEFAULT 0,
        last_check INT NOT NULL DEFAULT 0,
        last_snapshot INT NOT NULL DEFAULT 0,
        max_completion_pixels INT NOT NULL DEFAULT 0,
        max_completion_percent REAL NOT NULL DEFAULT 0,
        max_completion_time INT NOT NULL DEFAULT 0,
        total_progress INT NOT NULL DEFAULT 0,
        total_regress INT NOT NULL DEFAULT 0,
        largest_regress_pixels INT NOT NULL DEFAULT 0,
        largest_regress_time INT NOT NULL DEFAULT 0,
        change_streak_kind VARCHAR(16) NOT NULL DEFAULT 'none',
        change_streak_count INT NOT NULL DEFAULT 0,
        nochange_streak_count INT NOT NULL DEFAULT 0,
        recent_rate_pixels_per_hour REAL NOT NULL DEFAULT 0,
        recent_rate_window_start INT NOT NULL DEFAULT 0,
        has_missing_tiles INT NOT NULL DEFAULT 1,
        last_log_message TEXT NOT NULL DEFAULT '',
        owner_id INT NOT NULL REFERENCES person (id) ON DELETE CASCADE,
        CONSTRAINT uid_project_owner_name UNIQUE (owner_id, name)
    )",
    r#"CREATE INDEX IF NOT EXISTS idx_project_name ON project ("name")"#,
    r#"CREATE INDEX IF NOT EXISTS idx_project_state ON project ("state")"#,
    r"CREATE TABLE IF NOT EXISTS history_change (
        id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
        timestamp INT NOT NULL,
        status SMALLINT NOT NULL,
        num_remaining INT NOT NULL DEFAULT 0,
        num_target INT NOT NULL DEFAULT 0,
        completion_percent REAL NOT NULL DEFAULT 0,
        progress_pixels INT NOT NULL DEFAULT 0,
        regress_pixels INT NOT NULL DEFAULT 0,
        project_id INT NOT NULL REFERENCES project (id) ON DELETE CASCADE
    )",
    r"CREATE TABLE IF NOT EXISTS tile (
        id INT NOT NULL PRIMARY KEY,
        x INT NOT NULL,
        y INT NOT NULL,
        heat INT NOT NULL DEFAULT 999,
        last_checked INT NOT NULL DEFAULT 0,
        last_update INT NOT NULL,
        etag VARCHAR(255) NOT NULL DEFAULT ''
    )",
    r#"CREATE INDEX IF NOT EXISTS idx_tile_heat ON tile ("heat", "last_checked")"#,
    r"CREATE TABLE IF NOT EXISTS tile_project (
        id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
        project_id INT NOT NULL REFERENCES project (id) ON DELETE CASCADE,
        tile_id INT NOT NULL REFERENCES tile (id) ON DELETE CASCADE,
        CONSTRAINT uid_tile_project UNIQUE (tile_id, project_id)
    )",
];

pub async fn ensure_schema(pool: &SqlitePool) -> AppResult<()> {
    for statement in STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|error| db_error("Failed to create schema", &error))?;
    }
    Ok(())
}
