use crate::error::AppResult;
use domain::coords::TileCoord;
use domain::record::TileRecord;
use std::sync::Arc;

#[async_trait::async_trait]
pub trait TileRepositoryPort: Send + Sync {
    async fn get_tile(&self, tile: TileCoord) -> AppResult<Option<TileRecord>>;

    async fn upsert_tile(&self, record: &TileRecord) -> AppResult<()>;

    async fn get_tiles(&self, tiles: &[TileCoord]) -> AppResult<Vec<TileRecord>>;

    /// Tiles referenced by at least one Active project; the scheduler
    /// bootstraps from this set.
    async fn list_tiles_for_active_projects(&self) -> AppResult<Vec<TileRecord>>;
}

pub type DynTileRepositoryPort = Arc<dyn TileRepositoryPort>;
