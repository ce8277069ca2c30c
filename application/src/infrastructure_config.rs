use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Name of the SQLite record store under `data/`.
pub const DATABASE_FILE: &str = "pixel-hawk.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory for all pixel-hawk state.
    pub home: PathBuf,
    /// Seconds between polling cycles.
    pub polling_cycle_seconds: f64,
    /// Upstream HTTP timeout in seconds.
    pub http_timeout_seconds: u64,
    /// Floor for the hottest temperature queue size.
    pub min_hottest_queue_size: usize,
    /// Upstream tile server origin.
    pub tile_host: String,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_location: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogFormat {
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "pretty")]
    Pretty,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            home: PathBuf::from("./pixel-hawk-data"),
            // 60 times the golden ratio: maximally dissonant with the
            // upstream's 27 s and 30 s internal timers.
            polling_cycle_seconds: 30.0 * (1.0 + 5.0_f64.sqrt()),
            http_timeout_seconds: 5,
            min_hottest_queue_size: 4,
            tile_host: "backend.wplace.live".to_string(),
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: LogFormat::Pretty,
                include_location: false,
            },
        }
    }
}

impl Config {
    pub fn validate(&self) -> AppResult<()> {
        if self.home.as_os_str().is_empty() {
            return Err(AppError::ConfigError {
                message: "home cannot be empty".to_string(),
            });
        }

        if self.polling_cycle_seconds <= 0.0 || !self.polling_cycle_seconds.is_finite() {
            return Err(AppError::ConfigError {
                message: "polling_cycle_seconds must be greater than 0".to_string(),
            });
        }

        if self.http_timeout_seconds == 0 {
            return Err(AppError::ConfigError {
                message: "http_timeout_seconds must be greater than 0".to_string(),
            });
        }

        if self.min_hottest_queue_size == 0 {
            return Err(AppError::ConfigError {
                message: "min_hottest_queue_size must be greater than 0".to_string(),
            });
        }

        if self.tile_host.trim().is_empty() {
            return Err(AppError::ConfigError {
                message: "tile_host cannot be empty".to_string(),
            });
        }

        let probe = format!("https://{}/", self.tile_host);
        let parsed = url::Url::parse(&probe).map_err(|e| AppError::ConfigError {
            message: format!("tile_host '{}' is not a valid host: {e}", self.tile_host),
        })?;
        if parsed.host_str().is_none() || parsed.path() != "/" {
            return Err(AppError::ConfigError {
                message: format!("tile_host '{}' must be a bare host", self.tile_host),
            });
        }

        if self.logging.level.trim().is_empty() {
            return Err(AppError::ConfigError {
                message: "logging.level cannot be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Directory for project target PNG files, one subdirectory per owner.
    #[must_use]
    pub fn projects_dir(&self) -> PathBuf {
        self.home.join("projects")
    }

    /// Directory for canvas state snapshots.
    #[must_use]
    pub fn snapshots_dir(&self) -> PathBuf {
        self.home.join("snapshots")
    }

    /// Directory for the downloaded tile cache.
    #[must_use]
    pub fn tiles_dir(&self) -> PathBuf {
        self.home.join("tiles")
    }

    /// Directory for application logs.
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.home.join("logs")
    }

    /// Directory for the record store.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.home.join("data")
    }

    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join(DATABASE_FILE)
    }

    #[must_use]
    pub fn polling_cycle(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.polling_cycle_seconds)
    }

    #[must_use]
    pub fn all_directories(&self) -> Vec<PathBuf> {
        vec![
            self.projects_dir(),
            self.snapshots_dir(),
            self.tiles_dir(),
            self.logs_dir(),
            self.data_dir(),
        ]
    }

    #[must_use]
    pub fn home(&self) -> &Path {
        &self.home
    }
}
