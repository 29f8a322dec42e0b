use std::fs;
use std::path::{Path, PathBuf};

use image::Rgb;
use log::{info, warn};

use crate::cache::{write_all_atomic, TileCache};
use crate::config::{FailurePolicy, RenderConfig};
use crate::download::{HttpTileSource, TileFetcher, TileSource};
use crate::error::{Error, Result};
use crate::mosaic::{compose, encode_jpeg, output_path};
use crate::render::{crop_to_region, crop_window, draw_overlay, CropWindow, Overlay};
use crate::tile::{expand_to_grid, find_root_tile, BoundingBox, Tile};

/// What to render and under which name
#[derive(Clone, Debug)]
pub struct RenderRequest {
    pub prefix: String,
    pub overlay: Overlay,
    /// Box to frame; widened to the overlay's extent, or derived from it when absent
    pub bbox: Option<BoundingBox>,
}

/// State shared by the stages of one render
#[derive(Clone, Debug)]
pub struct RenderContext {
    pub root: Tile,
    pub bbox: BoundingBox,
    pub overlay: Overlay,
    pub prefix: String,
}

impl RenderContext {
    /// Locate the root tile for a request
    pub fn locate(request: RenderRequest, config: &RenderConfig) -> Result<Self> {
        if request.prefix.is_empty() || request.prefix.contains(['/', '\\']) {
            return Err(Error::InvalidConfig(format!("invalid output prefix {:?}", request.prefix)));
        }
        // A supplied box may frame more than the overlay, never less.
        let extent = request.overlay.bbox()?;
        let bbox = match request.bbox {
            Some(bbox) if bbox.contains(&extent) => bbox,
            Some(bbox) => {
                warn!("Bounding box of {} does not enclose its overlay, widening it", request.prefix);
                bbox.union(&extent)
            }
            None => extent,
        };
        if bbox.is_point() {
            warn!("Bounding box of {} is a single point", request.prefix);
        }
        let root = find_root_tile(&bbox, config);
        info!("Root tile for {}: {}/{}/{}", request.prefix, root.zoom, root.x, root.y);

        Ok(Self {
            root,
            bbox,
            overlay: request.overlay,
            prefix: request.prefix,
        })
    }
}

/// Files written by a successful render
#[derive(Clone, Debug)]
pub struct RenderOutput {
    pub root: Tile,
    pub tile_zoom: u8,
    pub merged_path: PathBuf,
    pub painted_path: PathBuf,
    pub crop: CropWindow,
    pub blank_tiles: usize,
}

/// Runs Locate -> Expand -> Fetch -> Compose -> Overlay -> Crop
pub struct Renderer<S: TileSource> {
    config: RenderConfig,
    fetcher: TileFetcher<S>,
    output_dir: PathBuf,
}

impl Renderer<HttpTileSource> {
    /// Renderer fetching from the configured tile server
    pub fn http<P: AsRef<Path>, Q: AsRef<Path>>(config: RenderConfig, cache_dir: P, output_dir: Q) -> Result<Self> {
        let source = HttpTileSource::new(&config.fetch)?;
        let cache = TileCache::new(cache_dir, &config.fetch.url_template)?;
        Self::new(config, source, cache, output_dir)
    }
}

impl<S: TileSource> Renderer<S> {
    pub fn new<P: AsRef<Path>>(config: RenderConfig, source: S, cache: TileCache, output_dir: P) -> Result<Self> {
        config.validate()?;
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir).map_err(|e| Error::io(&output_dir, e))?;

        let fetcher = TileFetcher::new(source, cache, config.fetch.clone());
        Ok(Self { config, fetcher, output_dir })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Render a request. Nothing is written unless every stage succeeds.
    pub fn render(&self, request: RenderRequest) -> Result<RenderOutput> {
        let context = RenderContext::locate(request, &self.config)?;
        let grid = expand_to_grid(&context.root, &self.config);

        let report = self.fetcher.fetch_all(&grid)?;
        let blank_tiles = report.failed_count();
        let blank = match self.config.failure_policy {
            FailurePolicy::Abort => {
                report.ensure_complete()?;
                None
            }
            FailurePolicy::BlankTile => {
                if blank_tiles > 0 {
                    warn!("{} of {} tiles will be blank", blank_tiles, report.total());
                }
                Some(Rgb(self.config.background))
            }
        };

        let mosaic = compose(&grid, &self.fetcher.cache().zoom_dir(grid.zoom), blank)?;

        let pixels = mosaic.project(&context.overlay.points());
        let mut painted = mosaic.image.clone();
        draw_overlay(&mut painted, &pixels, &self.config.overlay);

        let window = crop_window(&pixels, &self.config.crop);
        let cropped = crop_to_region(&painted, window, Rgb(self.config.background));
        let crop = window.clamp_to(painted.width(), painted.height());
        info!("Cropped {}x{} at ({}, {})", crop.side, crop.side, crop.x, crop.y);

        let merged_path = output_path(&self.output_dir, &context.prefix, "_merged");
        let painted_path = output_path(&self.output_dir, &context.prefix, "_merged_painted");
        let quality = self.config.jpeg_quality;
        let merged_jpeg = encode_jpeg(&mosaic.image, quality).map_err(|e| Error::image(&merged_path, e))?;
        let painted_jpeg = encode_jpeg(&cropped, quality).map_err(|e| Error::image(&painted_path, e))?;
        write_all_atomic(&[
            (merged_path.as_path(), merged_jpeg.as_slice()),
            (painted_path.as_path(), painted_jpeg.as_slice()),
        ])?;
        info!("Wrote {} and {}", merged_path.display(), painted_path.display());

        Ok(RenderOutput {
            root: context.root,
            tile_zoom: grid.zoom,
            merged_path,
            painted_path,
            crop,
            blank_tiles,
        })
    }
}
