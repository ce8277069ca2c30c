use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use domain::coords::TileCoord;
use domain::record::ProjectState;

use crate::diff::service::DiffEngine;
use crate::error::{AppError, AppResult};
use crate::ports::outgoing::{
    project_images::DynProjectImageStorePort,
    project_repository::DynProjectRepositoryPort,
    tile_fetcher::{DynTileFetchPort, FetchOutcome},
    tile_repository::DynTileRepositoryPort,
    tile_store::DynTileStorePort,
};
use crate::project::Project;
use crate::scheduler::queues::TileQueueSystem;

pub struct MonitorDeps {
    pub fetcher: DynTileFetchPort,
    pub tile_store: DynTileStorePort,
    pub images: DynProjectImageStorePort,
    pub tiles: DynTileRepositoryPort,
    pub projects: DynProjectRepositoryPort,
}

/// The polling orchestrator: owns the queue system and the loaded projects,
/// and runs one fetch-and-diff cycle at a time.
pub struct Monitor {
    fetcher: DynTileFetchPort,
    tiles: DynTileRepositoryPort,
    projects_repo: DynProjectRepositoryPort,
    diff: DiffEngine,
    scheduler: TileQueueSystem,
    projects: HashMap<i64, Project>,
}

impl Monitor {
    /// Loads projects, reconciles tile rows and links, refreshes person
    /// counters, runs the initial diffs, and builds the queue system.
    pub async fn start(min_hottest_queue_size: usize, deps: MonitorDeps) -> AppResult<Self> {
        let diff = DiffEngine::new(
            deps.tile_store,
            Arc::clone(&deps.images),
            Arc::clone(&deps.projects),
            Arc::clone(&deps.tiles),
        );

        let records = deps
            .projects
            .load_projects(&[ProjectState::Active, ProjectState::Passive])
            .await?;

        let mut projects: HashMap<i64, Project> = HashMap::new();
        for record in records {
            let rect = record.rectangle();
            if let Err(error) = deps
                .images
                .load_target(record.owner_id, &record.filename(), rect.size())
                .await
            {
                warn!(
                    "{}/{}: Skipping - file missing or invalid: {error}",
                    record.owner_id, record.name
                );
                continue;
            }

            deps.projects
                .sync_project_tiles(record.id, &rect.tiles())
                .await?;

            let mut project = Project::new(record);
            if let Err(error) = diff.run_diff(&mut project, None, epoch_now()).await {
                warn!(
                    "{}/{}: Initial diff failed: {error}",
                    project.record.owner_id, project.record.name
                );
            }
            projects.insert(project.record.id, project);
        }
        info!("Loaded {} projects from database.", projects.len());

        for person in deps.projects.list_persons().await? {
            let refreshed = deps.projects.refresh_person_counts(person.id).await?;
            info!(
                "{}: Watching {} tiles across {} active projects",
                refreshed.name, refreshed.watched_tiles_count, refreshed.active_projects_count
            );
        }

        let rows = deps.tiles.list_tiles_for_active_projects().await?;
        let first_seen = project_first_seen_index(projects.values());
        let scheduler = TileQueueSystem::new(min_hottest_queue_size, &rows, first_seen);

        let active = projects
            .values()
            .filter(|project| project.record.state == ProjectState::Active)
            .count();
        info!(
            "Monitoring {} active projects ({} passive) across {} tiles.",
            active,
            projects.len() - active,
            scheduler.len()
        );

        Ok(Self {
            fetcher: deps.fetcher,
            tiles: deps.tiles,
            projects_repo: deps.projects,
            diff,
            scheduler,
            projects,
        })
    }

    /// One polling cycle: pick a tile, fetch it, and diff the projects it
    /// belongs to.
    #[instrument(skip(self))]
    pub async fn poll_once(&mut self) -> AppResult<()> {
        debug!("Checking for tile updates...");

        let Some(tile) = self.scheduler.select_next_tile() else {
            warn!("No next tile returned by the queue system. No active projects?");
            return Ok(());
        };

        let Some(known) = self.tiles.get_tile(tile).await? else {
            warn!("Tile record not found for {tile}; retrying queue next cycle");
            self.scheduler.retry_current_queue();
            return Ok(());
        };

        let outcome = self.fetcher.fetch(tile, &known).await;
        let now = epoch_now();

        let changed = match &outcome {
            FetchOutcome::TransientFailure => {
                self.scheduler.retry_current_queue();
                return Ok(());
            }
            FetchOutcome::NotModified => {
                self.scheduler
                    .update_after_check(tile, now, known.last_update);
                false
            }
            FetchOutcome::Updated { last_update, .. } => {
                self.scheduler.update_after_check(tile, now, *last_update);
                true
            }
        };

        let mut row = known;
        row.last_checked = now;
        if let FetchOutcome::Updated { last_update, etag } = &outcome {
            row.last_update = row.last_update.max(*last_update);
            row.etag.clone_from(etag);
        }
        row.heat = self.scheduler.heat(tile);
        self.tiles.upsert_tile(&row).await?;

        for record in self.projects_repo.projects_overlapping(tile).await? {
            let Some(project) = self.projects.get_mut(&record.id) else {
                continue;
            };
            let result = if changed {
                self.diff.run_diff(project, Some(tile), now).await
            } else {
                self.diff.run_nochange(project, now).await
            };
            if let Err(error) = result {
                if matches!(error, AppError::MissingFile { .. }) {
                    warn!(
                        "{}/{}: {error}; skipping project",
                        project.record.owner_id, project.record.name
                    );
                    continue;
                }
                return Err(error);
            }
        }

        Ok(())
    }

    #[must_use]
    pub fn watched_tile_count(&self) -> usize {
        self.scheduler.len()
    }

    #[must_use]
    pub fn project_count(&self) -> usize {
        self.projects.len()
    }
}

fn project_first_seen_index<'a>(
    projects: impl Iterator<Item = &'a Project>,
) -> HashMap<TileCoord, i64> {
    let mut first_seen: HashMap<TileCoord, i64> = HashMap::new();
    for project in projects.filter(|project| project.record.state == ProjectState::Active) {
        for tile in project.rect().tiles() {
            first_seen
                .entry(tile)
                .and_modify(|existing| *existing = (*existing).min(project.record.first_seen))
                .or_insert(project.record.first_seen);
        }
    }
    first_seen
}

fn epoch_now() -> i64 {
    chrono::Utc::now().timestamp()
}
