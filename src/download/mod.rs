use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use rayon::prelude::*;
use reqwest::blocking::Client;

use crate::cache::TileCache;
use crate::config::FetchConfig;
use crate::error::{Error, Result};
use crate::tile::{TileGrid, TileIndex};

/// Somewhere tile images can be fetched from
pub trait TileSource: Sync {
    /// Encoded image bytes of tile (zoom, x, y)
    fn fetch(&self, zoom: u8, tile: TileIndex) -> Result<Vec<u8>>;
}

/// Tile server reached over HTTP, addressed by a `{z}/{x}/{y}` URL template
pub struct HttpTileSource {
    client: Client,
    url_template: String,
}

impl HttpTileSource {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("flightmap/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::HttpClient)?;

        Ok(Self {
            client,
            url_template: config.url_template.clone(),
        })
    }

    pub fn tile_url(&self, zoom: u8, tile: TileIndex) -> String {
        tile_url(&self.url_template, zoom, tile)
    }
}

impl TileSource for HttpTileSource {
    fn fetch(&self, zoom: u8, tile: TileIndex) -> Result<Vec<u8>> {
        let url = self.tile_url(zoom, tile);
        debug!("GET {}", url);

        let network = |source: reqwest::Error| Error::Network { z: zoom, x: tile.x, y: tile.y, source };
        let response = self.client.get(&url).send().map_err(network)?;

        if !response.status().is_success() {
            return Err(Error::BadStatus {
                z: zoom,
                x: tile.x,
                y: tile.y,
                status: response.status().as_u16(),
            });
        }
        let data = response.bytes().map_err(network)?;
        Ok(data.to_vec())
    }
}

pub fn tile_url(template: &str, zoom: u8, tile: TileIndex) -> String {
    template
        .replace("{z}", &zoom.to_string())
        .replace("{x}", &tile.x.to_string())
        .replace("{y}", &tile.y.to_string())
}

/// A tile that is available on disk
#[derive(Clone, Debug, PartialEq)]
pub struct FetchedTile {
    pub path: PathBuf,
    pub from_cache: bool,
}

/// Outcome of fetching one tile
#[derive(Debug)]
pub struct TileFetch {
    pub tile: TileIndex,
    pub result: Result<FetchedTile>,
}

/// Per-tile results of one fan-out, collected after every fetch has finished
#[derive(Debug)]
pub struct FetchReport {
    pub zoom: u8,
    pub fetches: Vec<TileFetch>,
}

impl FetchReport {
    pub fn total(&self) -> usize {
        self.fetches.len()
    }

    pub fn failures(&self) -> impl Iterator<Item = (TileIndex, &Error)> {
        self.fetches
            .iter()
            .filter_map(|f| f.result.as_ref().err().map(|e| (f.tile, e)))
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    pub fn is_complete(&self) -> bool {
        self.failed_count() == 0
    }

    pub fn cached_count(&self) -> usize {
        self.fetches
            .iter()
            .filter(|f| matches!(&f.result, Ok(t) if t.from_cache))
            .count()
    }

    /// Fail unless every tile is available
    pub fn ensure_complete(&self) -> Result<()> {
        let failed = self.failed_count();
        if failed > 0 {
            for (tile, err) in self.failures() {
                warn!("Tile {}/{}/{} unavailable: {}", self.zoom, tile.x, tile.y, err);
            }
            return Err(Error::FetchFailed { failed, total: self.total() });
        }
        Ok(())
    }
}

/// Downloads the tiles of a grid into the tile cache
pub struct TileFetcher<S: TileSource> {
    source: S,
    cache: TileCache,
    config: FetchConfig,
}

impl<S: TileSource> TileFetcher<S> {
    pub fn new(source: S, cache: TileCache, config: FetchConfig) -> Self {
        Self { source, cache, config }
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    /// Fetch every distinct tile of `grid` concurrently and wait for all of
    /// them. Empty slots are skipped and a tile used by several slots is
    /// fetched once. A failing tile does not stop the others.
    pub fn fetch_all(&self, grid: &TileGrid) -> Result<FetchReport> {
        let tiles = grid.distinct_tiles();
        let zoom = grid.zoom;
        info!("Fetching {} tiles at zoom {}", tiles.len(), zoom);

        let workers = self.config.concurrency.unwrap_or(tiles.len()).max(1);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build()?;

        let fetches: Vec<TileFetch> = pool.install(|| {
            tiles
                .par_iter()
                .map(|&tile| TileFetch {
                    tile,
                    result: self.fetch_one(zoom, tile),
                })
                .collect()
        });

        let report = FetchReport { zoom, fetches };
        info!(
            "Finished fetching tiles: {} ok ({} cached), {} failed",
            report.total() - report.failed_count(),
            report.cached_count(),
            report.failed_count()
        );
        Ok(report)
    }

    fn fetch_one(&self, zoom: u8, tile: TileIndex) -> Result<FetchedTile> {
        if !self.config.refresh {
            if let Some(path) = self.cache.get_cached_tile(zoom, tile) {
                debug!("Using cached tile {}", path.display());
                return Ok(FetchedTile { path, from_cache: true });
            }
        }

        let mut attempt = 0;
        loop {
            match self.source.fetch(zoom, tile) {
                Ok(data) => {
                    let path = self.cache.save_tile(zoom, tile, &data)?;
                    return Ok(FetchedTile { path, from_cache: false });
                }
                Err(err) if attempt < self.config.retries && err.is_retryable() => {
                    attempt += 1;
                    warn!(
                        "Tile {}/{}/{} failed ({}), retry {}/{}",
                        zoom, tile.x, tile.y, err, attempt, self.config.retries
                    );
                    thread::sleep(Duration::from_millis(self.config.retry_backoff_ms * attempt as u64));
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;
    use crate::testutil::MemoryTileSource;
    use crate::tile::{expand_to_grid, Tile};

    fn fetch_config() -> FetchConfig {
        FetchConfig {
            retry_backoff_ms: 0,
            ..FetchConfig::default()
        }
    }

    fn grid_at(zoom: u8, x: i32, y: i32) -> TileGrid {
        let root = Tile { zoom, x, y, lon: 0.0, lat: 0.0 };
        expand_to_grid(&root, &RenderConfig::default())
    }

    #[test]
    fn test_tile_url() {
        let url = tile_url(crate::config::DEFAULT_TILE_URL, 6, TileIndex::new(33, 21));
        assert_eq!(url, "https://maptiles.glidercheck.com/hypsometric/6/33/21.jpeg");
    }

    #[test]
    fn test_fetches_every_tile_once() {
        let dir = tempfile::tempdir().unwrap();
        let source = MemoryTileSource::new(256);
        let cache = TileCache::new(dir.path(), "mem://{z}/{x}/{y}").unwrap();
        let fetcher = TileFetcher::new(source, cache, fetch_config());

        let grid = grid_at(4, 8, 5);
        let report = fetcher.fetch_all(&grid).unwrap();
        assert_eq!(report.total(), 16);
        assert!(report.is_complete());
        assert_eq!(fetcher.source.calls(), 16);

        for (_, tile) in grid.slots() {
            let tile = tile.unwrap();
            assert!(fetcher.cache().get_cached_tile(6, tile).is_some());
        }
    }

    #[test]
    fn test_repeated_slots_are_fetched_once() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::new(dir.path(), "mem://{z}/{x}/{y}").unwrap();
        let fetcher = TileFetcher::new(MemoryTileSource::new(256), cache, fetch_config());

        // Capped zoom increase: 16 slots share 4 tiles.
        let report = fetcher.fetch_all(&grid_at(10, 550, 335)).unwrap();
        assert_eq!(report.total(), 4);
        assert_eq!(fetcher.source.calls(), 4);
    }

    #[test]
    fn test_cached_tiles_are_reused() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::new(dir.path(), "mem://{z}/{x}/{y}").unwrap();
        let fetcher = TileFetcher::new(MemoryTileSource::new(256), cache.clone(), fetch_config());
        let grid = grid_at(4, 8, 5);

        fetcher.fetch_all(&grid).unwrap();
        let report = fetcher.fetch_all(&grid).unwrap();
        assert_eq!(report.cached_count(), 16);
        assert_eq!(fetcher.source.calls(), 16);

        let refreshing = TileFetcher::new(
            MemoryTileSource::new(256),
            cache,
            FetchConfig { refresh: true, ..fetch_config() },
        );
        let report = refreshing.fetch_all(&grid).unwrap();
        assert_eq!(report.cached_count(), 0);
        assert_eq!(refreshing.source.calls(), 16);
    }

    #[test]
    fn test_failures_are_reported_per_tile() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::new(dir.path(), "mem://{z}/{x}/{y}").unwrap();
        let source = MemoryTileSource::new(256).with_missing(TileIndex::new(33, 21));
        let fetcher = TileFetcher::new(source, cache, fetch_config());

        let report = fetcher.fetch_all(&grid_at(4, 8, 5)).unwrap();
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.total(), 16);
        let (tile, err) = report.failures().next().unwrap();
        assert_eq!(tile, TileIndex::new(33, 21));
        assert!(matches!(err, Error::BadStatus { status: 404, .. }), "got {:?}", err);
        assert!(matches!(
            report.ensure_complete(),
            Err(Error::FetchFailed { failed: 1, total: 16 })
        ));
        // Not-found is final, no retries.
        assert_eq!(fetcher.source.calls(), 16);
        assert!(fetcher.cache().get_cached_tile(6, TileIndex::new(33, 21)).is_none());
    }

    #[test]
    fn test_transient_failures_are_retried() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::new(dir.path(), "mem://{z}/{x}/{y}").unwrap();
        let source = MemoryTileSource::new(256).with_flaky(TileIndex::new(32, 20), 2);
        let fetcher = TileFetcher::new(source, cache, fetch_config());

        let report = fetcher.fetch_all(&grid_at(4, 8, 5)).unwrap();
        assert!(report.is_complete());
        assert_eq!(fetcher.source.calls(), 18);

        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::new(dir.path(), "mem://{z}/{x}/{y}").unwrap();
        let source = MemoryTileSource::new(256).with_flaky(TileIndex::new(32, 20), 3);
        let fetcher = TileFetcher::new(source, cache, FetchConfig { concurrency: Some(2), ..fetch_config() });
        let report = fetcher.fetch_all(&grid_at(4, 8, 5)).unwrap();
        assert_eq!(report.failed_count(), 1);
    }
}
