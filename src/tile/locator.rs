use log::debug;

use super::{BoundingBox, Tile};
use crate::config::RenderConfig;

/// Find the deepest zoom (at most `config.root_zoom`) at which both corners of
/// `bbox` fall into the same tile, and return the min corner's tile there.
///
/// Terminates after at most `root_zoom + 1` steps: at zoom 0 there is only one
/// tile, so both corners always agree.
pub fn find_root_tile(bbox: &BoundingBox, config: &RenderConfig) -> Tile {
    let mut zoom = config.root_zoom;
    loop {
        let min_tile = Tile::containing(bbox.min_corner(), zoom);
        let max_tile = Tile::containing(bbox.max_corner(), zoom);
        let (dx, dy) = min_tile.distance(&max_tile);
        debug!("Zoom {}: corners at ({}, {}) and ({}, {})", zoom, min_tile.x, min_tile.y, max_tile.x, max_tile.y);

        if (dx == 0 && dy == 0) || zoom == 0 {
            return min_tile;
        }
        zoom -= 1;
    }
}
