use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use log::{debug, info, warn};

use crate::cache::tile_file_name;
use crate::error::{Error, Result};
use crate::tile::projection::geo_to_pixel;
use crate::tile::{GeoPoint, Tile, TileGrid, TileIndex};

/// Subtiles of a grid drawn side by side on one canvas.
///
/// The canvas origin is the upper-left corner of the root tile.
pub struct Mosaic {
    pub image: RgbImage,
    pub root: Tile,
    pub grid_side: u32,
    /// Size of one grid slot on the canvas
    pub tile_width: u32,
    pub tile_height: u32,
}

impl Mosaic {
    /// Pixel width and height the root tile spans on the canvas
    pub fn root_span(&self) -> (f64, f64) {
        (
            (self.grid_side * self.tile_width) as f64,
            (self.grid_side * self.tile_height) as f64,
        )
    }

    /// Project a point into canvas pixels: global pixel position at the root
    /// zoom (with the root tile as large as the canvas) minus the root tile's
    /// own offset.
    pub fn to_local_pixel(&self, point: GeoPoint) -> (f64, f64) {
        let (span_x, span_y) = self.root_span();
        let (px, _) = geo_to_pixel(point.lon, point.lat, self.root.zoom, span_x);
        let (_, py) = geo_to_pixel(point.lon, point.lat, self.root.zoom, span_y);
        (px - span_x * self.root.x as f64, py - span_y * self.root.y as f64)
    }

    pub fn project(&self, points: &[GeoPoint]) -> Vec<(f64, f64)> {
        points.iter().map(|&p| self.to_local_pixel(p)).collect()
    }
}

/// Assemble the tiles of `grid` found in `tile_dir` (as `{x}_{y}.jpeg`).
///
/// Slot 0 is required and its tile fixes the slot size. A subtile covering a
/// block of slots (capped zoom increase) is scaled up over the whole block, so
/// the canvas stays a linear image of the root tile. Other missing tiles are an error
/// unless `blank_missing` gives a colour to fill their block with.
pub fn compose(grid: &TileGrid, tile_dir: &Path, blank_missing: Option<Rgb<u8>>) -> Result<Mosaic> {
    let missing = |tile: TileIndex| Error::MissingTile { z: grid.zoom, x: tile.x, y: tile.y };

    let side = grid.side;
    let block = grid.block_side().ok_or_else(|| {
        Error::InvalidConfig(format!(
            "grid side {} does not split into 2^{} subtiles",
            side, grid.zoom_increase
        ))
    })?;

    let first = grid.get(0).ok_or_else(|| {
        let shift = grid.zoom_increase;
        missing(TileIndex::new(grid.root.x << shift, grid.root.y << shift))
    })?;
    let first_image = load_tile(tile_dir, first)?.ok_or_else(|| missing(first))?;
    let (tile_width, tile_height) = first_image.dimensions();
    let (block_width, block_height) = (block * tile_width, block * tile_height);

    let mut canvas = RgbImage::new(side * tile_width, side * tile_height);
    info!(
        "Composing {}x{} slots ({} per subtile) of {}x{} into {}x{} mosaic",
        side,
        side,
        block,
        tile_width,
        tile_height,
        canvas.width(),
        canvas.height()
    );

    for (slot, tile) in grid.slots() {
        let (row, col) = grid.position(slot);
        if row % block != 0 || col % block != 0 {
            continue;
        }
        let x = (col * tile_width) as i64;
        let y = (row * tile_height) as i64;

        let tile_image = match tile {
            Some(tile) if slot == 0 => Some((tile, first_image.clone())),
            Some(tile) => load_tile(tile_dir, tile)?.map(|image| (tile, image)),
            None => None,
        };

        match (tile_image, tile, blank_missing) {
            (Some((tile, image)), _, _) => {
                let image = if image.dimensions() != (block_width, block_height) {
                    debug!("Resizing tile {}/{}/{} to {}x{}", grid.zoom, tile.x, tile.y, block_width, block_height);
                    imageops::resize(&image, block_width, block_height, FilterType::Triangle)
                } else {
                    image
                };
                imageops::replace(&mut canvas, &image, x, y);
            }
            (None, Some(tile), Some(color)) => {
                warn!("Tile {}/{}/{} unavailable, drawing blank tile", grid.zoom, tile.x, tile.y);
                let blank = RgbImage::from_pixel(block_width, block_height, color);
                imageops::replace(&mut canvas, &blank, x, y);
            }
            (None, Some(tile), None) => return Err(missing(tile)),
            (None, None, color) => {
                // Block not needed; keep it in the background colour when one is given.
                if let Some(color) = color {
                    let blank = RgbImage::from_pixel(block_width, block_height, color);
                    imageops::replace(&mut canvas, &blank, x, y);
                }
            }
        }
    }

    Ok(Mosaic {
        image: canvas,
        root: grid.root,
        grid_side: side,
        tile_width,
        tile_height,
    })
}

/// Decoded tile, or None if the file does not exist
fn load_tile(tile_dir: &Path, tile: TileIndex) -> Result<Option<RgbImage>> {
    let path = tile_dir.join(tile_file_name(tile));
    if !path.is_file() {
        return Ok(None);
    }
    let image = image::open(&path).map_err(|e| Error::image(&path, e))?;
    Ok(Some(image.to_rgb8()))
}

/// `{out_dir}/{prefix}{suffix}.jpeg`
pub fn output_path(out_dir: &Path, prefix: &str, suffix: &str) -> PathBuf {
    out_dir.join(format!("{}{}.jpeg", prefix, suffix))
}

/// JPEG bytes of `image`
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> image::ImageResult<Vec<u8>> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality).encode_image(image)?;
    Ok(buf)
}
