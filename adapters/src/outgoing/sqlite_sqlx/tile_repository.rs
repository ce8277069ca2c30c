use sqlx::SqlitePool;
use tracing::instrument;

use domain::coords::TileCoord;
use domain::record::TileRecord;

use pixel_hawk_application::error::AppResult;
use pixel_hawk_application::ports::outgoing::tile_repository::TileRepositoryPort;

use super::db_error;

pub struct SqliteTileRepository {
    pool: SqlitePool,
}

impl SqliteTileRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TileRow {
    x: i64,
    y: i64,
    heat: i64,
    last_checked: i64,
    last_update: i64,
    etag: String,
}

impl From<TileRow> for TileRecord {
    fn from(row: TileRow) -> Self {
        Self {
            tile: TileCoord::new(row.x as u16, row.y as u16),
            heat: row.heat as u16,
            last_checked: row.last_checked,
            last_update: row.last_update,
            etag: row.etag,
        }
    }
}

const TILE_COLUMNS: &str = "x, y, heat, last_checked, last_update, etag";

#[async_trait::async_trait]
impl TileRepositoryPort for SqliteTileRepository {
    #[instrument(skip(self))]
    async fn get_tile(&self, tile: TileCoord) -> AppResult<Option<TileRecord>> {
        let sql = format!("SELECT {TILE_COLUMNS} FROM tile WHERE id = ?");
        let row = sqlx::query_as::<_, TileRow>(&sql)
            .bind(i64::from(tile.id()))
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| db_error(&format!("Failed to get tile {tile}"), &error))?;
        Ok(row.map(TileRecord::from))
    }

    #[instrument(skip(self, record))]
    async fn upsert_tile(&self, record: &TileRecord) -> AppResult<()> {
        sqlx::query(
            r"INSERT INTO tile (id, x, y, heat, last_checked, last_update, etag)
              VALUES (?, ?, ?, ?, ?, ?, ?)
              ON CONFLICT (id) DO UPDATE SET
                  heat = excluded.heat,
                  last_checked = excluded.last_checked,
                  last_update = excluded.last_update,
                  etag = excluded.etag",
        )
        .bind(i64::from(record.id()))
        .bind(i64::from(record.tile.x))
        .bind(i64::from(record.tile.y))
        .bind(i64::from(record.heat))
        .bind(record.last_checked)
        .bind(record.last_update)
        .bind(&record.etag)
        .execute(&self.pool)
        .await
        .map_err(|error| db_error(&format!("Failed to upsert tile {}", record.tile), &error))?;
        Ok(())
    }

    async fn get_tiles(&self, tiles: &[TileCoord]) -> AppResult<Vec<TileRecord>> {
        let mut records = Vec::with_capacity(tiles.len());
        for tile in tiles {
            if let Some(record) = self.get_tile(*tile).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    #[instrument(skip(self))]
    async fn list_tiles_for_active_projects(&self) -> AppResult<Vec<TileRecord>> {
        let sql = format!(
            r"SELECT DISTINCT t.x AS x, t.y AS y, t.heat AS heat,
                     t.last_checked AS last_checked, t.last_update AS last_update,
                     t.etag AS etag
              FROM tile t
              JOIN tile_project tp ON tp.tile_id = t.id
              JOIN project p ON p.id = tp.project_id
              WHERE p.state = {}
              ORDER BY x, y",
            domain::record::ProjectState::Active.code()
        );
        let rows = sqlx::query_as::<_, TileRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| db_error("Failed to list tiles for active projects", &error))?;
        Ok(rows.into_iter().map(TileRecord::from).collect())
    }
}
