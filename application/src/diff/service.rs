use tracing::{info, instrument};

use domain::coords::TileCoord;
use domain::record::{DiffStatus, HistoryChange};
use domain::stats;

use crate::error::AppResult;
use crate::ports::outgoing::{
    project_images::DynProjectImageStorePort, project_repository::DynProjectRepositoryPort,
    tile_repository::DynTileRepositoryPort, tile_store::DynTileStorePort,
};
use crate::project::Project;

/// Runs project diffs: stitches the cached canvas under the project
/// rectangle, compares it against the target and the previous snapshot, and
/// persists the outcome.
pub struct DiffEngine {
    tile_store: DynTileStorePort,
    images: DynProjectImageStorePort,
    projects: DynProjectRepositoryPort,
    tiles: DynTileRepositoryPort,
}

impl DiffEngine {
    #[must_use]
    pub fn new(
        tile_store: DynTileStorePort,
        images: DynProjectImageStorePort,
        projects: DynProjectRepositoryPort,
        tiles: DynTileRepositoryPort,
    ) -> Self {
        Self {
            tile_store,
            images,
            projects,
            tiles,
        }
    }

    /// One full diff for `project`. `changed_tile` narrows the tile-update
    /// bookkeeping to the tile that triggered this diff; without it the
    /// whole rectangle is rescanned.
    #[instrument(skip(self, project), fields(project = %project.record.name))]
    pub async fn run_diff(
        &self,
        project: &mut Project,
        changed_tile: Option<TileCoord>,
        now: i64,
    ) -> AppResult<()> {
        let rect = project.rect();
        let owner_id = project.record.owner_id;
        let filename = project.record.filename();

        let target = self
            .images
            .load_target(owner_id, &filename, rect.size())
            .await?;

        let stitched = self.tile_store.stitch(rect).await?;
        // Once every covering tile has shown up in the cache the counts are
        // trustworthy; tiles are never evicted, so the flag never flips back.
        if project.record.has_missing_tiles {
            project.record.has_missing_tiles = stitched.missing_tiles;
        }

        // Load the previous snapshot before overwriting it. A snapshot of a
        // different shape belongs to an older rectangle and is useless.
        let previous = self
            .images
            .load_snapshot(owner_id, &filename)
            .await?
            .filter(|snapshot| snapshot.size() == target.size());

        self.images
            .save_snapshot(owner_id, &filename, &stitched.image)
            .await?;
        project.record.last_snapshot = now;

        let outcome = stats::process_diff(
            &mut project.record,
            stitched.image.data(),
            target.data(),
            previous.as_ref().map(|snapshot| snapshot.data()),
            now,
        );

        if outcome.status == DiffStatus::InProgress {
            self.track_tile_updates(project, changed_tile).await?;
        }

        let change = HistoryChange {
            id: 0,
            project_id: project.record.id,
            timestamp: now,
            status: outcome.status,
            num_remaining: outcome.num_remaining,
            num_target: outcome.num_target,
            completion_percent: outcome.completion_percent,
            progress_pixels: outcome.progress_pixels,
            regress_pixels: outcome.regress_pixels,
        };
        self.projects.record_diff(&project.record, &change).await?;

        info!("{}", project.record.last_log_message);
        Ok(())
    }

    /// Bumps `last_check`, prunes the 24-hour list, and persists the record.
    /// No history row is written.
    pub async fn run_nochange(&self, project: &mut Project, now: i64) -> AppResult<()> {
        project.record.last_check = now;
        project.prune_old_tile_updates();
        self.projects.update_project(&project.record).await
    }

    async fn track_tile_updates(
        &self,
        project: &mut Project,
        changed_tile: Option<TileCoord>,
    ) -> AppResult<()> {
        match changed_tile {
            Some(tile) => {
                if let Some(row) = self.tiles.get_tile(tile).await? {
                    if row.last_update > 0 {
                        project.record_tile_update(tile, row.last_update);
                    }
                }
            }
            None => {
                project.prune_old_tile_updates();
                let coords: Vec<TileCoord> = project.rect().tiles().into_iter().collect();
                for row in self.tiles.get_tiles(&coords).await? {
                    if row.last_update > 0 {
                        project.record_tile_update(row.tile, row.last_update);
                    }
                }
            }
        }
        Ok(())
    }
}
