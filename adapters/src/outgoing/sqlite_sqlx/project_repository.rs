use std::collections::BTreeSet;

use sqlx::SqlitePool;
use tracing::instrument;

use domain::coords::TileCoord;
use domain::record::{
    HistoryChange, PersonRecord, ProjectRecord, ProjectState, StreakKind, TileRecord,
};

use pixel_hawk_application::error::{AppError, AppResult};
use pixel_hawk_application::ports::outgoing::project_repository::ProjectRepositoryPort;

use super::db_error;

pub struct SqliteProjectRepository {
    pool: SqlitePool,
}

impl SqliteProjectRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const PROJECT_COLUMNS: &str = "id, owner_id, name, state, x, y, width, height, \
     first_seen, last_check, last_snapshot, \
     max_completion_pixels, max_completion_percent, max_completion_time, \
     total_progress, total_regress, largest_regress_pixels, largest_regress_time, \
     change_streak_kind, change_streak_count, nochange_streak_count, \
     recent_rate_pixels_per_hour, recent_rate_window_start, \
     has_missing_tiles, last_log_message";

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: i64,
    owner_id: i64,
    name: String,
    state: i64,
    x: i64,
    y: i64,
    width: i64,
    height: i64,
    first_seen: i64,
    last_check: i64,
    last_snapshot: i64,
    max_completion_pixels: i64,
    max_completion_percent: f64,
    max_completion_time: i64,
    total_progress: i64,
    total_regress: i64,
    largest_regress_pixels: i64,
    largest_regress_time: i64,
    change_streak_kind: String,
    change_streak_count: i64,
    nochange_streak_count: i64,
    recent_rate_pixels_per_hour: f64,
    recent_rate_window_start: i64,
    has_missing_tiles: bool,
    last_log_message: String,
}

impl TryFrom<ProjectRow> for ProjectRecord {
    type Error = AppError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        let state = ProjectState::from_code(row.state)?;
        let change_streak_kind = StreakKind::parse(&row.change_streak_kind)?;
        Ok(Self {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            state,
            x: row.x as u32,
            y: row.y as u32,
            width: row.width as u32,
            height: row.height as u32,
            first_seen: row.first_seen,
            last_check: row.last_check,
            last_snapshot: row.last_snapshot,
            max_completion_pixels: row.max_completion_pixels,
            max_completion_percent: row.max_completion_percent,
            max_completion_time: row.max_completion_time,
            total_progress: row.total_progress,
            total_regress: row.total_regress,
            largest_regress_pixels: row.largest_regress_pixels,
            largest_regress_time: row.largest_regress_time,
            change_streak_kind,
            change_streak_count: row.change_streak_count,
            nochange_streak_count: row.nochange_streak_count,
            recent_rate_pixels_per_hour: row.recent_rate_pixels_per_hour,
            recent_rate_window_start: row.recent_rate_window_start,
            has_missing_tiles: row.has_missing_tiles,
            last_log_message: row.last_log_message,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PersonRow {
    id: i64,
    name: String,
    discord_id: Option<i64>,
    access: i64,
    watched_tiles_count: i64,
    active_projects_count: i64,
}

impl From<PersonRow> for PersonRecord {
    fn from(row: PersonRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            discord_id: row.discord_id,
            access: row.access as u32,
            watched_tiles_count: row.watched_tiles_count,
            active_projects_count: row.active_projects_count,
        }
    }
}

async fn insert_history_in<'e, E>(executor: E, change: &HistoryChange) -> AppResult<i64>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let result = sqlx::query(
        r"INSERT INTO history_change
              (project_id, timestamp, status, num_remaining, num_target,
               completion_percent, progress_pixels, regress_pixels)
          VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(change.project_id)
    .bind(change.timestamp)
    .bind(change.status.code())
    .bind(change.num_remaining)
    .bind(change.num_target)
    .bind(change.completion_percent)
    .bind(change.progress_pixels)
    .bind(change.regress_pixels)
    .execute(executor)
    .await
    .map_err(|error| db_error("Failed to insert history change", &error))?;
    Ok(result.last_insert_rowid())
}

async fn update_project_in<'e, E>(executor: E, record: &ProjectRecord) -> AppResult<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r"UPDATE project SET
              state = ?,
              x = ?, y = ?, width = ?, height = ?,
              first_seen = ?, last_check = ?, last_snapshot = ?,
              max_completion_pixels = ?, max_completion_percent = ?, max_completion_time = ?,
              total_progress = ?, total_regress = ?,
              largest_regress_pixels = ?, largest_regress_time = ?,
              change_streak_kind = ?, change_streak_count = ?, nochange_streak_count = ?,
              recent_rate_pixels_per_hour = ?, recent_rate_window_start = ?,
              has_missing_tiles = ?, last_log_message = ?
          WHERE id = ?",
    )
    .bind(record.state.code())
    .bind(i64::from(record.x))
    .bind(i64::from(record.y))
    .bind(i64::from(record.width))
    .bind(i64::from(record.height))
    .bind(record.first_seen)
    .bind(record.last_check)
    .bind(record.last_snapshot)
    .bind(record.max_completion_pixels)
    .bind(record.max_completion_percent)
    .bind(record.max_completion_time)
    .bind(record.total_progress)
    .bind(record.total_regress)
    .bind(record.largest_regress_pixels)
    .bind(record.largest_regress_time)
    .bind(record.change_streak_kind.as_str())
    .bind(record.change_streak_count)
    .bind(record.nochange_streak_count)
    .bind(record.recent_rate_pixels_per_hour)
    .bind(record.recent_rate_window_start)
    .bind(record.has_missing_tiles)
    .bind(&record.last_log_message)
    .bind(record.id)
    .execute(executor)
    .await
    .map_err(|error| db_error(&format!("Failed to update project {}", record.name), &error))?;
    Ok(())
}

#[async_trait::async_trait]
impl ProjectRepositoryPort for SqliteProjectRepository {
    #[instrument(skip(self))]
    async fn load_projects(&self, states: &[ProjectState]) -> AppResult<Vec<ProjectRecord>> {
        let mut records = Vec::new();
        for state in states {
            let sql = format!("SELECT {PROJECT_COLUMNS} FROM project WHERE state = ?");
            let rows = sqlx::query_as::<_, ProjectRow>(&sql)
                .bind(state.code())
                .fetch_all(&self.pool)
                .await
                .map_err(|error| db_error("Failed to load projects", &error))?;
            for row in rows {
                records.push(ProjectRecord::try_from(row)?);
            }
        }
        records.sort_by_key(|record| record.id);
        Ok(records)
    }

    #[instrument(skip(self))]
    async fn projects_overlapping(&self, tile: TileCoord) -> AppResult<Vec<ProjectRecord>> {
        let sql = format!(
            r"SELECT {PROJECT_COLUMNS} FROM project
              WHERE state = ? AND id IN
                  (SELECT project_id FROM tile_project WHERE tile_id = ?)
              ORDER BY id"
        );
        let rows = sqlx::query_as::<_, ProjectRow>(&sql)
            .bind(ProjectState::Active.code())
            .bind(i64::from(tile.id()))
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                db_error(&format!("Failed to load projects overlapping {tile}"), &error)
            })?;
        rows.into_iter().map(ProjectRecord::try_from).collect()
    }

    async fn update_project(&self, record: &ProjectRecord) -> AppResult<()> {
        update_project_in(&self.pool, record).await
    }

    async fn insert_history(&self, change: &HistoryChange) -> AppResult<i64> {
        insert_history_in(&self.pool, change).await
    }

    #[instrument(skip(self, record, change), fields(project = %record.name))]
    async fn record_diff(&self, record: &ProjectRecord, change: &HistoryChange) -> AppResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| db_error("Failed to begin diff transaction", &error))?;
        insert_history_in(&mut *tx, change).await?;
        update_project_in(&mut *tx, record).await?;
        tx.commit()
            .await
            .map_err(|error| db_error("Failed to commit diff transaction", &error))?;
        Ok(())
    }

    #[instrument(skip(self, tiles))]
    async fn sync_project_tiles(
        &self,
        project_id: i64,
        tiles: &BTreeSet<TileCoord>,
    ) -> AppResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| db_error("Failed to begin tile sync", &error))?;

        for tile in tiles {
            let burning = TileRecord::new_burning(*tile);
            sqlx::query(
                r"INSERT OR IGNORE INTO tile (id, x, y, heat, last_checked, last_update, etag)
                  VALUES (?, ?, ?, ?, 0, 0, '')",
            )
            .bind(i64::from(burning.id()))
            .bind(i64::from(tile.x))
            .bind(i64::from(tile.y))
            .bind(i64::from(TileRecord::BURNING_HEAT))
            .execute(&mut *tx)
            .await
            .map_err(|error| db_error(&format!("Failed to ensure tile {tile}"), &error))?;

            sqlx::query(
                "INSERT OR IGNORE INTO tile_project (project_id, tile_id) VALUES (?, ?)",
            )
            .bind(project_id)
            .bind(i64::from(tile.id()))
            .execute(&mut *tx)
            .await
            .map_err(|error| db_error(&format!("Failed to link tile {tile}"), &error))?;
        }

        if tiles.is_empty() {
            sqlx::query("DELETE FROM tile_project WHERE project_id = ?")
                .bind(project_id)
                .execute(&mut *tx)
                .await
                .map_err(|error| db_error("Failed to drop stale tile links", &error))?;
        } else {
            let placeholders = vec!["?"; tiles.len()].join(", ");
            let sql = format!(
                "DELETE FROM tile_project WHERE project_id = ? AND tile_id NOT IN ({placeholders})"
            );
            let mut query = sqlx::query(&sql).bind(project_id);
            for tile in tiles {
                query = query.bind(i64::from(tile.id()));
            }
            query
                .execute(&mut *tx)
                .await
                .map_err(|error| db_error("Failed to drop stale tile links", &error))?;
        }

        tx.commit()
            .await
            .map_err(|error| db_error("Failed to commit tile sync", &error))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_persons(&self) -> AppResult<Vec<PersonRecord>> {
        let rows = sqlx::query_as::<_, PersonRow>(
            r"SELECT id, name, discord_id, access, watched_tiles_count, active_projects_count
              FROM person ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| db_error("Failed to list persons", &error))?;
        Ok(rows.into_iter().map(PersonRecord::from).collect())
    }

    #[instrument(skip(self))]
    async fn refresh_person_counts(&self, person_id: i64) -> AppResult<PersonRecord> {
        let watched: i64 = sqlx::query_scalar(
            r"SELECT COUNT(DISTINCT tp.tile_id)
              FROM tile_project tp
              JOIN project p ON p.id = tp.project_id
              WHERE p.owner_id = ? AND p.state = ?",
        )
        .bind(person_id)
        .bind(ProjectState::Active.code())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| db_error("Failed to count watched tiles", &error))?;

        let active: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM project WHERE owner_id = ? AND state = ?")
                .bind(person_id)
                .bind(ProjectState::Active.code())
                .fetch_one(&self.pool)
                .await
                .map_err(|error| db_error("Failed to count active projects", &error))?;

        sqlx::query(
            "UPDATE person SET watched_tiles_count = ?, active_projects_count = ? WHERE id = ?",
        )
        .bind(watched)
        .bind(active)
        .bind(person_id)
        .execute(&self.pool)
        .await
        .map_err(|error| db_error("Failed to update person counts", &error))?;

        let row = sqlx::query_as::<_, PersonRow>(
            r"SELECT id, name, discord_id, access, watched_tiles_count, active_projects_count
              FROM person WHERE id = ?",
        )
        .bind(person_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| db_error("Failed to reload person", &error))?;
        Ok(PersonRecord::from(row))
    }
}
