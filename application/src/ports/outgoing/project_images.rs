use crate::error::AppResult;
use domain::coords::Size;
use domain::image::PalettedImage;
use std::sync::Arc;

#[async_trait::async_trait]
pub trait ProjectImageStorePort: Send + Sync {
    /// Loads the target image for a project, enforcing the palette and the
    /// expected pixel size. Missing files surface as
    /// `AppError::MissingFile`.
    async fn load_target(
        &self,
        owner_id: i64,
        filename: &str,
        expected: Size,
    ) -> AppResult<PalettedImage>;

    /// Loads the previous canvas snapshot, if one was saved.
    async fn load_snapshot(&self, owner_id: i64, filename: &str)
    -> AppResult<Option<PalettedImage>>;

    /// Overwrites the canvas snapshot for a project.
    async fn save_snapshot(
        &self,
        owner_id: i64,
        filename: &str,
        image: &PalettedImage,
    ) -> AppResult<()>;
}

pub type DynProjectImageStorePort = Arc<dyn ProjectImageStorePort>;
