use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use domain::coords::{Rectangle, TileCoord};
use domain::image::PalettedImage;
use domain::palette::Palette;

use pixel_hawk_application::error::AppResult;
use pixel_hawk_application::ports::outgoing::tile_store::{StitchedCanvas, TileStorePort};

use crate::outgoing::png_image;

/// Filesystem tile cache: one indexed PNG per tile under `tiles/`, named
/// `tile-<tx>_<ty>.png`.
pub struct FsTileStore {
    tiles_dir: PathBuf,
    palette: &'static Palette,
}

impl FsTileStore {
    #[must_use]
    pub fn new(tiles_dir: PathBuf, palette: &'static Palette) -> Self {
        Self { tiles_dir, palette }
    }

    fn cache_path(&self, tile: TileCoord) -> PathBuf {
        self.tiles_dir.join(format!("tile-{tile}.png"))
    }

    async fn read_image(&self, path: &Path) -> AppResult<Option<PalettedImage>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        let decoded = png_image::decode(&bytes, self.palette)?;
        Ok(Some(decoded.image))
    }
}

#[async_trait::async_trait]
impl TileStorePort for FsTileStore {
    async fn read(&self, tile: TileCoord) -> AppResult<Option<PalettedImage>> {
        self.read_image(&self.cache_path(tile)).await
    }

    #[instrument(skip(self, image))]
    async fn write(&self, tile: TileCoord, image: &PalettedImage) -> AppResult<()> {
        let path = self.cache_path(tile);
        let bytes = png_image::encode(image, self.palette)?;
        write_atomically(&path, &bytes).await
    }

    async fn exists(&self, tile: TileCoord) -> bool {
        tokio::fs::try_exists(self.cache_path(tile))
            .await
            .unwrap_or(false)
    }

    async fn stitch(&self, rect: Rectangle) -> AppResult<StitchedCanvas> {
        let mut image = PalettedImage::new_empty(rect.size());
        let mut missing_tiles = false;
        for tile in rect.tiles() {
            let Some(cached) = self.read(tile).await? else {
                debug!("{tile}: Tile missing from cache, leaving transparent");
                missing_tiles = true;
                continue;
            };
            let (dx, dy) = tile.origin().offset_from(rect.point());
            image.paste(&cached, dx, dy);
        }
        Ok(StitchedCanvas {
            image,
            missing_tiles,
        })
    }
}

/// Write-then-rename so concurrent readers only ever see complete files.
pub(crate) async fn write_atomically(path: &Path, bytes: &[u8]) -> AppResult<()> {
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);
    tokio::fs::write(&temp, bytes).await?;
    tokio::fs::rename(&temp, path).await?;
    Ok(())
}
