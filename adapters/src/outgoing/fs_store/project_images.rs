use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{info, instrument, warn};

use domain::coords::Size;
use domain::image::PalettedImage;
use domain::palette::Palette;

use pixel_hawk_application::error::{AppError, AppResult};
use pixel_hawk_application::ports::outgoing::project_images::ProjectImageStorePort;

use crate::outgoing::fs_store::tile_store::write_atomically;
use crate::outgoing::png_image;

/// Target images under `projects/<owner_id>/` and canvas snapshots under
/// `snapshots/<owner_id>/`, both stored as indexed PNGs.
pub struct FsProjectImageStore {
    projects_dir: PathBuf,
    snapshots_dir: PathBuf,
    palette: &'static Palette,
}

impl FsProjectImageStore {
    #[must_use]
    pub fn new(projects_dir: PathBuf, snapshots_dir: PathBuf, palette: &'static Palette) -> Self {
        Self {
            projects_dir,
            snapshots_dir,
            palette,
        }
    }

    fn target_path(&self, owner_id: i64, filename: &str) -> PathBuf {
        self.projects_dir.join(owner_id.to_string()).join(filename)
    }

    fn snapshot_path(&self, owner_id: i64, filename: &str) -> PathBuf {
        self.snapshots_dir.join(owner_id.to_string()).join(filename)
    }
}

#[async_trait::async_trait]
impl ProjectImageStorePort for FsProjectImageStore {
    #[instrument(skip(self))]
    async fn load_target(
        &self,
        owner_id: i64,
        filename: &str,
        expected: Size,
    ) -> AppResult<PalettedImage> {
        let path = self.target_path(owner_id, filename);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(AppError::MissingFile {
                    message: format!("File not found at {}", path.display()),
                });
            }
            Err(error) => return Err(error.into()),
        };

        let decoded = png_image::decode(&bytes, self.palette)?;
        if !decoded.was_paletted {
            // Normalize uploads so future loads take the indexed fast path.
            info!("{filename}: Overwriting with paletted version...");
            let reencoded = png_image::encode(&decoded.image, self.palette)?;
            write_atomically(&path, &reencoded).await?;
        }

        if decoded.image.size() != expected {
            return Err(AppError::ValidationError {
                message: format!(
                    "Size mismatch - record says {expected}, file is {}",
                    decoded.image.size()
                ),
            });
        }
        Ok(decoded.image)
    }

    async fn load_snapshot(
        &self,
        owner_id: i64,
        filename: &str,
    ) -> AppResult<Option<PalettedImage>> {
        let path = self.snapshot_path(owner_id, filename);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        match png_image::decode(&bytes, self.palette) {
            Ok(decoded) => Ok(Some(decoded.image)),
            Err(error) => {
                // A corrupt snapshot only costs one progress measurement.
                warn!("Failed to load snapshot for {filename}: {error}");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, image))]
    async fn save_snapshot(
        &self,
        owner_id: i64,
        filename: &str,
        image: &PalettedImage,
    ) -> AppResult<()> {
        let path = self.snapshot_path(owner_id, filename);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = png_image::encode(image, self.palette)?;
        write_atomically(&path, &bytes).await
    }
}
