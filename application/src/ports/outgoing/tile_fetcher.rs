use domain::coords::TileCoord;
use domain::record::TileRecord;
use std::sync::Arc;

/// Result of polling the upstream server for one tile. Failures are a
/// variant, not an error: the scheduler retries the same queue next cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// 304: the cache is still valid.
    NotModified,
    /// 200: the tile changed; the cache has been rewritten.
    Updated { last_update: i64, etag: String },
    /// Network error, unexpected status, or undecodable body.
    TransientFailure,
}

impl FetchOutcome {
    #[must_use]
    pub fn changed(&self) -> bool {
        matches!(self, Self::Updated { .. })
    }
}

#[async_trait::async_trait]
pub trait TileFetchPort: Send + Sync {
    /// Conditionally fetches one tile, using `known.last_update` and
    /// `known.etag` for `If-Modified-Since` / `If-None-Match`.
    async fn fetch(&self, tile: TileCoord, known: &TileRecord) -> FetchOutcome;
}

pub type DynTileFetchPort = Arc<dyn TileFetchPort>;
