use crate::error::AppResult;
use domain::coords::TileCoord;
use domain::record::{HistoryChange, PersonRecord, ProjectRecord, ProjectState};
use std::collections::BTreeSet;
use std::sync::Arc;

#[async_trait::async_trait]
pub trait ProjectRepositoryPort: Send + Sync {
    async fn load_projects(&self, states: &[ProjectState]) -> AppResult<Vec<ProjectRecord>>;

    /// Active projects whose rectangle covers the given tile.
    async fn projects_overlapping(&self, tile: TileCoord) -> AppResult<Vec<ProjectRecord>>;

    async fn update_project(&self, record: &ProjectRecord) -> AppResult<()>;

    async fn insert_history(&self, change: &HistoryChange) -> AppResult<i64>;

    /// Appends the history row and persists the post-diff project fields in
    /// one transaction.
    async fn record_diff(&self, record: &ProjectRecord, change: &HistoryChange) -> AppResult<()>;

    /// Ensures a `tile` row and a `tile_project` link exist for exactly the
    /// given tiles; stale links are removed.
    async fn sync_project_tiles(
        &self,
        project_id: i64,
        tiles: &BTreeSet<TileCoord>,
    ) -> AppResult<()>;

    async fn list_persons(&self) -> AppResult<Vec<PersonRecord>>;

    /// Recomputes `watched_tiles_count` and `active_projects_count` from the
    /// person's Active projects and returns the refreshed record.
    async fn refresh_person_counts(&self, person_id: i64) -> AppResult<PersonRecord>;
}

pub type DynProjectRepositoryPort = Arc<dyn ProjectRepositoryPort>;
