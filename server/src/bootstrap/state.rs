use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use domain::palette::Palette;

use pixel_hawk_adapters::outgoing::fs_store::project_images::FsProjectImageStore;
use pixel_hawk_adapters::outgoing::fs_store::tile_store::FsTileStore;
use pixel_hawk_adapters::outgoing::http_reqwest::tile_fetcher::{
    ReqwestFetcherConfig, ReqwestTileFetcher,
};
use pixel_hawk_adapters::outgoing::sqlite_sqlx::project_repository::SqliteProjectRepository;
use pixel_hawk_adapters::outgoing::sqlite_sqlx::schema::ensure_schema;
use pixel_hawk_adapters::outgoing::sqlite_sqlx::tile_repository::SqliteTileRepository;
use pixel_hawk_adapters::outgoing::sqlite_sqlx::connect_pool;

use pixel_hawk_application::error::AppResult;
use pixel_hawk_application::infrastructure_config::Config;
use pixel_hawk_application::monitor::service::{Monitor, MonitorDeps};
use pixel_hawk_application::ports::outgoing::tile_store::DynTileStorePort;

/// Wires the adapters together and brings up the monitor.
pub struct AppState {
    pub config: Config,
    pub monitor: Monitor,
}

impl AppState {
    pub async fn new(config: Config) -> AppResult<AppState> {
        for directory in config.all_directories() {
            std::fs::create_dir_all(&directory)?;
        }

        let pool = connect_pool(&config.database_path()).await?;
        ensure_schema(&pool).await?;
        info!("Record store ready at {}", config.database_path().display());

        let palette = Palette::wplace();
        let tile_store: DynTileStorePort =
            Arc::new(FsTileStore::new(config.tiles_dir(), palette));
        let images = Arc::new(FsProjectImageStore::new(
            config.projects_dir(),
            config.snapshots_dir(),
            palette,
        ));
        let tiles = Arc::new(SqliteTileRepository::new(pool.clone()));
        let projects = Arc::new(SqliteProjectRepository::new(pool));

        let fetcher = Arc::new(ReqwestTileFetcher::new(
            &ReqwestFetcherConfig {
                tile_host: config.tile_host.clone(),
                timeout: Duration::from_secs(config.http_timeout_seconds),
            },
            Arc::clone(&tile_store),
            palette,
        )?);

        let monitor = Monitor::start(
            config.min_hottest_queue_size,
            MonitorDeps {
                fetcher,
                tile_store,
                images,
                tiles,
                projects,
            },
        )
        .await?;

        Ok(AppState { config, monitor })
    }
}
