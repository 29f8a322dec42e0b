use std::collections::BTreeSet;

use log::debug;

use super::projection::{lon_lat_to_tile, tile_fraction_to_lon_lat};
use super::{Tile, TileIndex};
use crate::config::RenderConfig;

/// Square grid of subtiles covering a root tile, stored row-major.
///
/// A slot is `None` when no tile is needed there (its sample fell outside the
/// tile range of the subtile zoom).
#[derive(Clone, Debug, PartialEq)]
pub struct TileGrid {
    pub root: Tile,
    pub side: u32,
    pub zoom: u8,          // Zoom of the subtiles
    pub zoom_increase: u8, // zoom - root.zoom
    slots: Vec<Option<TileIndex>>,
}

impl TileGrid {
    pub fn from_slots(root: Tile, side: u32, zoom_increase: u8, slots: Vec<Option<TileIndex>>) -> Self {
        debug_assert_eq!(slots.len(), (side * side) as usize, "grid needs side * side slots");
        Self {
            root,
            side,
            zoom: root.zoom + zoom_increase,
            zoom_increase,
            slots,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<TileIndex> {
        self.slots.get(slot).copied().flatten()
    }

    /// (row, column) of a slot.
    pub fn position(&self, slot: usize) -> (u32, u32) {
        let slot = slot as u32;
        (slot / self.side, slot % self.side)
    }

    /// Side, in slots, of the square block a single subtile covers. None when
    /// `side` is not a multiple of `2^zoom_increase`.
    pub fn block_side(&self) -> Option<u32> {
        let subtiles = 1u32.checked_shl(self.zoom_increase as u32)?;
        (self.side % subtiles == 0).then(|| self.side / subtiles)
    }

    pub fn slots(&self) -> impl Iterator<Item = (usize, Option<TileIndex>)> + '_ {
        self.slots.iter().copied().enumerate()
    }

    /// Each needed tile once, in a stable order.
    pub fn distinct_tiles(&self) -> Vec<TileIndex> {
        self.slots
            .iter()
            .flatten()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Expand `root` into `grid_side x grid_side` subtiles at a deeper zoom.
///
/// Each slot samples the centre of its cell in the root tile and takes the
/// subtile containing that sample. With `2^zoom_increase == grid_side` every slot
/// gets its own subtile; a smaller (capped) increase makes each subtile cover a
/// square block of slots (see [`TileGrid::block_side`]).
pub fn expand_to_grid(root: &Tile, config: &RenderConfig) -> TileGrid {
    let side = config.grid_side;
    let zoom_increase = config.effective_zoom_increase(root.zoom);
    let zoom = root.zoom + zoom_increase;
    let tiles_at_zoom = 1i64 << zoom;

    let mut slots = Vec::with_capacity((side * side) as usize);
    for row in 0..side {
        for col in 0..side {
            let fx = root.x as f64 + (col as f64 + 0.5) / side as f64;
            let fy = root.y as f64 + (row as f64 + 0.5) / side as f64;
            let (lon, lat) = tile_fraction_to_lon_lat(fx, fy, root.zoom);
            let (x, y) = lon_lat_to_tile(lon, lat, zoom);

            let in_range = (0..tiles_at_zoom).contains(&(x as i64)) && (0..tiles_at_zoom).contains(&(y as i64));
            slots.push(in_range.then(|| TileIndex::new(x, y)));
        }
    }

    debug!(
        "Expanded root {}/{}/{} into {}x{} grid at zoom {}",
        root.zoom, root.x, root.y, side, side, zoom
    );
    TileGrid::from_slots(*root, side, zoom_increase, slots)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_tile(zoom: u8, x: i32, y: i32) -> Tile {
        let (lon, lat) = tile_fraction_to_lon_lat(x as f64, y as f64, zoom);
        Tile { zoom, x, y, lon, lat }
    }

    #[test]
    fn test_grid_has_side_squared_slots() {
        for side in 1..=5 {
            let config = RenderConfig { grid_side: side, ..RenderConfig::default() };
            let grid = expand_to_grid(&root_tile(4, 8, 5), &config);
            assert_eq!(grid.len(), (side * side) as usize);
        }
    }

    #[test]
    fn test_berlin_hamburg_subtiles() {
        let grid = expand_to_grid(&root_tile(4, 8, 5), &RenderConfig::default());
        assert_eq!(grid.zoom, 6);
        assert_eq!(grid.zoom_increase, 2);

        // Every subtile of z4/8/5 at z6 appears exactly once, row-major.
        for slot in 0..16 {
            let (row, col) = grid.position(slot);
            assert_eq!(grid.get(slot), Some(TileIndex::new(32 + col as i32, 20 + row as i32)));
        }
        assert_eq!(grid.distinct_tiles().len(), 16);
    }

    #[test]
    fn test_slots_sample_cell_centres() {
        // Three cells over four subtiles: centres at 1/6, 1/2 and 5/6 of the root.
        let config = RenderConfig { grid_side: 3, ..RenderConfig::default() };
        let grid = expand_to_grid(&root_tile(4, 8, 5), &config);
        // Corner offsets would give x = 32, 33, 34.
        let row: Vec<_> = (0..3).map(|slot| grid.get(slot)).collect();
        assert_eq!(
            row,
            vec![Some(TileIndex::new(32, 20)), Some(TileIndex::new(34, 20)), Some(TileIndex::new(35, 20))]
        );
        assert_eq!(grid.get(6).map(|t| t.y), Some(23));
    }

    #[test]
    fn test_world_root_subtiles() {
        let grid = expand_to_grid(&root_tile(0, 0, 0), &RenderConfig::default());
        assert_eq!(grid.zoom, 2);
        assert_eq!(grid.get(0), Some(TileIndex::new(0, 0)));
        assert_eq!(grid.get(15), Some(TileIndex::new(3, 3)));
        assert_eq!(grid.get(4), Some(TileIndex::new(0, 1)));
    }

    #[test]
    fn test_zoom_never_exceeds_max() {
        let config = RenderConfig::default();
        for zoom in 0..=config.max_zoom {
            let grid = expand_to_grid(&root_tile(zoom, 0, 0), &config);
            assert!(grid.zoom <= config.max_zoom, "zoom {} exceeds max", grid.zoom);
            assert_eq!(grid.len(), 16);
        }
    }

    #[test]
    fn test_capped_increase_repeats_tiles() {
        let config = RenderConfig::default();
        let grid = expand_to_grid(&root_tile(10, 550, 335), &config);
        assert_eq!(grid.zoom, 11);
        assert_eq!(grid.zoom_increase, 1);
        assert_eq!(grid.get(0), grid.get(1));
        assert_ne!(grid.get(1), grid.get(2));
        assert_eq!(grid.distinct_tiles().len(), 4);
        assert_eq!(grid.block_side(), Some(2));
        // Slots (2, 0), (2, 1), (3, 0) and (3, 1) form the block of tile (1100, 671).
        for slot in [8, 9, 12, 13] {
            assert_eq!(grid.get(slot), Some(TileIndex::new(1100, 671)));
        }

        let grid = expand_to_grid(&root_tile(11, 1100, 671), &config);
        assert_eq!(grid.zoom_increase, 0);
        assert_eq!(grid.distinct_tiles(), vec![TileIndex::new(1100, 671)]);
        assert_eq!(grid.block_side(), Some(4));

        let config = RenderConfig { grid_side: 3, ..RenderConfig::default() };
        assert_eq!(expand_to_grid(&root_tile(4, 8, 5), &config).block_side(), None);
    }

    #[test]
    fn test_out_of_range_slots_are_empty() {
        let grid = expand_to_grid(&root_tile(2, 4, 0), &RenderConfig::default());
        assert!(grid.slots().all(|(_, tile)| tile.is_none()));
        assert!(grid.distinct_tiles().is_empty());
    }
}
