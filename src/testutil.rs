//! In-memory tile server and tile images for tests.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};

use crate::cache::tile_file_name;
use crate::download::TileSource;
use crate::error::{Error, Result};
use crate::tile::TileIndex;

/// Solid colour derived from the tile index, so tiles can be told apart.
pub fn tile_color(tile: TileIndex) -> Rgb<u8> {
    Rgb([(tile.x * 40 % 256) as u8, (tile.y * 40 % 256) as u8, 128])
}

pub fn jpeg_tile(size: u32, color: Rgb<u8>) -> Vec<u8> {
    let image = RgbImage::from_pixel(size, size, color);
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, 95)
        .encode_image(&image)
        .expect("Failed to encode test tile");
    buf
}

/// Tile with a dark square over its middle quarter, to check where a tile's
/// centre ends up after scaling.
pub fn marked_jpeg_tile(size: u32, color: Rgb<u8>) -> Vec<u8> {
    let mut image = RgbImage::from_pixel(size, size, color);
    let (start, end) = (size * 3 / 8, size * 5 / 8);
    for y in start..end {
        for x in start..end {
            image.put_pixel(x, y, MARK);
        }
    }
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, 95)
        .encode_image(&image)
        .expect("Failed to encode test tile");
    buf
}

pub const MARK: Rgb<u8> = Rgb([0, 0, 0]);

pub fn is_mark(pixel: Rgb<u8>) -> bool {
    pixel.0.iter().map(|&c| c as u32).sum::<u32>() < 120
}

/// Write `{x}_{y}.jpeg` tiles into `dir`.
pub fn write_tiles(dir: &Path, tiles: &[TileIndex], size: u32) {
    std::fs::create_dir_all(dir).unwrap();
    for &tile in tiles {
        std::fs::write(dir.join(tile_file_name(tile)), jpeg_tile(size, tile_color(tile))).unwrap();
    }
}

pub struct MemoryTileSource {
    tile_size: u32,
    missing: HashSet<TileIndex>,
    marked: bool,
    flaky: Mutex<HashMap<TileIndex, u32>>,
    calls: AtomicUsize,
}

impl MemoryTileSource {
    pub fn new(tile_size: u32) -> Self {
        Self {
            tile_size,
            missing: HashSet::new(),
            marked: false,
            flaky: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer 404 for `tile`.
    pub fn with_missing(mut self, tile: TileIndex) -> Self {
        self.missing.insert(tile);
        self
    }

    /// Serve tiles with a dark centre square.
    pub fn with_marks(mut self) -> Self {
        self.marked = true;
        self
    }

    /// Answer 503 for the first `failures` requests of `tile`.
    pub fn with_flaky(self, tile: TileIndex, failures: u32) -> Self {
        self.flaky.lock().unwrap().insert(tile, failures);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TileSource for MemoryTileSource {
    fn fetch(&self, zoom: u8, tile: TileIndex) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let status = |status| Error::BadStatus { z: zoom, x: tile.x, y: tile.y, status };

        if self.missing.contains(&tile) {
            return Err(status(404));
        }
        if let Some(remaining) = self.flaky.lock().unwrap().get_mut(&tile) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(status(503));
            }
        }
        if self.marked {
            return Ok(marked_jpeg_tile(self.tile_size, tile_color(tile)));
        }
        Ok(jpeg_tile(self.tile_size, tile_color(tile)))
    }
}
