use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{ETAG, HeaderMap, HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use tracing::{debug, info, instrument};

use domain::coords::TileCoord;
use domain::palette::Palette;
use domain::record::TileRecord;

use pixel_hawk_application::error::{AppError, AppResult};
use pixel_hawk_application::ports::outgoing::tile_fetcher::{FetchOutcome, TileFetchPort};
use pixel_hawk_application::ports::outgoing::tile_store::DynTileStorePort;

use crate::outgoing::http_reqwest::http_date::{format_http_date, parse_http_date};
use crate::outgoing::png_image;

#[derive(Debug, Clone)]
pub struct ReqwestFetcherConfig {
    pub tile_host: String,
    pub timeout: Duration,
}

/// Conditional tile downloads from the upstream canvas server. Owns one
/// HTTP client, reused across cycles; a changed tile is decoded, coerced,
/// and written to the tile store before the outcome is reported.
pub struct ReqwestTileFetcher {
    client: reqwest::Client,
    tile_host: String,
    store: DynTileStorePort,
    palette: &'static Palette,
}

impl ReqwestTileFetcher {
    pub fn new(
        config: &ReqwestFetcherConfig,
        store: DynTileStorePort,
        palette: &'static Palette,
    ) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::ConfigError {
                message: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            tile_host: config.tile_host.clone(),
            store,
            palette,
        })
    }

    fn tile_url(&self, tile: TileCoord) -> String {
        format!(
            "https://{}/files/s0/tiles/{}/{}.png",
            self.tile_host, tile.x, tile.y
        )
    }
}

/// Conditional headers for a tile we may have seen before: nothing for a
/// burning tile, otherwise `If-Modified-Since` and, when the server gave us
/// one, `If-None-Match`.
fn conditional_headers(known: &TileRecord) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if known.last_update > 0 {
        if let Some(value) = format_http_date(known.last_update) {
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.insert(IF_MODIFIED_SINCE, value);
            }
        }
    }
    if !known.etag.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&known.etag) {
            headers.insert(IF_NONE_MATCH, value);
        }
    }
    headers
}

/// `Last-Modified` from a 200 response; falls back to the current time when
/// the header is missing or unparseable.
fn response_last_update(headers: &HeaderMap, now: i64) -> i64 {
    headers
        .get(LAST_MODIFIED)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_http_date)
        .unwrap_or(now)
}

fn response_etag(headers: &HeaderMap) -> String {
    headers
        .get(ETAG)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[async_trait::async_trait]
impl TileFetchPort for ReqwestTileFetcher {
    #[instrument(skip(self, known))]
    async fn fetch(&self, tile: TileCoord, known: &TileRecord) -> FetchOutcome {
        let url = self.tile_url(tile);
        let headers = conditional_headers(known);

        let response = match self.client.get(&url).headers(headers).send().await {
            Ok(response) => response,
            Err(error) => {
                debug!("Tile {tile}: Request failed: {error}");
                return FetchOutcome::TransientFailure;
            }
        };

        match response.status() {
            StatusCode::NOT_MODIFIED => FetchOutcome::NotModified,
            StatusCode::OK => {
                let now = chrono::Utc::now().timestamp();
                let last_update = response_last_update(response.headers(), now);
                let etag = response_etag(response.headers());

                let body = match response.bytes().await {
                    Ok(body) => body,
                    Err(error) => {
                        debug!("Tile {tile}: Failed to read body: {error}");
                        return FetchOutcome::TransientFailure;
                    }
                };

                let decoded = match png_image::decode(&body, self.palette) {
                    Ok(decoded) => decoded,
                    Err(error) => {
                        debug!("Tile {tile}: Image decode failed: {error}");
                        return FetchOutcome::TransientFailure;
                    }
                };

                info!("Tile {tile}: Change detected, updating cache...");
                if let Err(error) = self.store.write(tile, &decoded.image).await {
                    debug!("Tile {tile}: Cache write failed: {error}");
                    return FetchOutcome::TransientFailure;
                }

                FetchOutcome::Updated { last_update, etag }
            }
            status => {
                debug!("Tile {tile}: HTTP {status}");
                FetchOutcome::TransientFailure
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::{conditional_headers, response_etag, response_last_update};
    use domain::coords::TileCoord;
    use domain::record::TileRecord;
    use reqwest::header::{HeaderMap, HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH};

    #[test]
    fn burning_tile_sends_no_conditional_headers() {
        let record = TileRecord::new_burning(TileCoord::new(1, 2));
        assert!(conditional_headers(&record).is_empty());
    }

    #[test]
    fn known_tile_sends_both_validators() {
        let record = TileRecord {
            tile: TileCoord::new(1, 2),
            heat: 0,
            last_checked: 1_700_052_400,
            last_update: 1_700_052_326,
            etag: "\"abc123\"".to_string(),
        };
        let headers = conditional_headers(&record);
        assert_eq!(
            headers.get(IF_MODIFIED_SINCE).unwrap(),
            "Wed, 15 Nov 2023 12:45:26 GMT"
        );
        assert_eq!(headers.get(IF_NONE_MATCH).unwrap(), "\"abc123\"");
    }

    #[test]
    fn last_modified_parses_with_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::LAST_MODIFIED,
            HeaderValue::from_static("Wed, 15 Nov 2023 12:45:26 GMT"),
        );
        assert_eq!(response_last_update(&headers, 42), 1_700_052_326);

        let mut broken = HeaderMap::new();
        broken.insert(
            reqwest::header::LAST_MODIFIED,
            HeaderValue::from_static("not a date"),
        );
        assert_eq!(response_last_update(&broken, 42), 42);

        assert_eq!(response_last_update(&HeaderMap::new(), 42), 42);
    }

    #[test]
    fn etag_defaults_to_empty() {
        let mut headers = HeaderMap::new();
        assert_eq!(response_etag(&headers), "");
        headers.insert(reqwest::header::ETAG, HeaderValue::from_static("\"x\""));
        assert_eq!(response_etag(&headers), "\"x\"");
    }
}
