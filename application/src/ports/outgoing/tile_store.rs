use crate::error::AppResult;
use domain::coords::{Rectangle, TileCoord};
use domain::image::PalettedImage;
use std::sync::Arc;

/// Canvas state assembled from cached tiles under a project rectangle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StitchedCanvas {
    pub image: PalettedImage,
    /// True when at least one covering tile was absent from the cache; the
    /// missing regions stay transparent.
    pub missing_tiles: bool,
}

#[async_trait::async_trait]
pub trait TileStorePort: Send + Sync {
    async fn read(&self, tile: TileCoord) -> AppResult<Option<PalettedImage>>;

    /// Atomically replaces the cached image for `tile`.
    async fn write(&self, tile: TileCoord, image: &PalettedImage) -> AppResult<()>;

    async fn exists(&self, tile: TileCoord) -> bool;

    /// Stitches cached tiles to exactly cover `rect`.
    async fn stitch(&self, rect: Rectangle) -> AppResult<StitchedCanvas>;
}

pub type DynTileStorePort = Arc<dyn TileStorePort>;
