use tracing::{debug, info};

use pixel_hawk_application::infrastructure_config::Config;

pub fn log_startup_info(config: &Config) {
    info!("pixel-hawk - WPlace paint project change tracker");
    debug!("pixel-hawk home: {}", config.home().display());
    info!(
        "Place project PNG files in: {}",
        config.projects_dir().display()
    );
    debug!("Upstream tile host: {}", config.tile_host);
    debug!(
        "Scheduler min hottest queue size: {}",
        config.min_hottest_queue_size
    );
}
