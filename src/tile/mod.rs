use serde::Deserialize;

use crate::error::{Error, Result};

pub mod grid;
pub mod locator;
pub mod projection;

pub use grid::{expand_to_grid, TileGrid};
pub use locator::find_root_tile;

/// A WGS84 position in degrees
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(from = "[f64; 2]")]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Reject points the Mercator formulas cannot project.
    pub fn check_projectable(&self) -> Result<()> {
        if !self.lon.is_finite() || !self.lat.is_finite() || self.lat.abs() >= 90.0 {
            return Err(Error::ProjectionDegenerate { lon: self.lon, lat: self.lat });
        }
        Ok(())
    }
}

impl From<[f64; 2]> for GeoPoint {
    fn from(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

/// Geographic bounds as (min_lon, min_lat, max_lon, max_lat)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Build a bounding box, rejecting swapped corners and unprojectable values.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<Self> {
        let bbox = Self::new_unchecked(min_lon, min_lat, max_lon, max_lat);
        bbox.min_corner().check_projectable()?;
        bbox.max_corner().check_projectable()?;
        if min_lon > max_lon {
            return Err(Error::DegenerateBBox(format!(
                "min longitude {} is greater than max longitude {}",
                min_lon, max_lon
            )));
        }
        if min_lat > max_lat {
            return Err(Error::DegenerateBBox(format!(
                "min latitude {} is greater than max latitude {}",
                min_lat, max_lat
            )));
        }
        Ok(bbox)
    }

    pub fn new_unchecked(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self { min_lon, min_lat, max_lon, max_lat }
    }

    /// Smallest box enclosing every point of a path.
    pub fn from_points(points: &[GeoPoint]) -> Result<Self> {
        let first = points.first().ok_or(Error::EmptyTrack)?;
        let mut bbox = Self::new_unchecked(first.lon, first.lat, first.lon, first.lat);
        for p in &points[1..] {
            bbox.min_lon = bbox.min_lon.min(p.lon);
            bbox.min_lat = bbox.min_lat.min(p.lat);
            bbox.max_lon = bbox.max_lon.max(p.lon);
            bbox.max_lat = bbox.max_lat.max(p.lat);
        }
        Self::new(bbox.min_lon, bbox.min_lat, bbox.max_lon, bbox.max_lat)
    }

    pub fn from_array(values: [f64; 4]) -> Result<Self> {
        Self::new(values[0], values[1], values[2], values[3])
    }

    /// Smallest box enclosing both boxes
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        Self::new_unchecked(
            self.min_lon.min(other.min_lon),
            self.min_lat.min(other.min_lat),
            self.max_lon.max(other.max_lon),
            self.max_lat.max(other.max_lat),
        )
    }

    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.min_lon <= other.min_lon
            && self.min_lat <= other.min_lat
            && self.max_lon >= other.max_lon
            && self.max_lat >= other.max_lat
    }

    pub fn min_corner(&self) -> GeoPoint {
        GeoPoint::new(self.min_lon, self.min_lat)
    }

    pub fn max_corner(&self) -> GeoPoint {
        GeoPoint::new(self.max_lon, self.max_lat)
    }

    pub fn is_point(&self) -> bool {
        self.min_lon == self.max_lon && self.min_lat == self.max_lat
    }
}

/// Tile coordinate within one zoom level
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileIndex {
    pub x: i32,
    pub y: i32,
}

impl TileIndex {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A slippy-map tile plus the point it was derived from
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tile {
    pub zoom: u8,
    pub x: i32,
    pub y: i32,
    pub lon: f64,
    pub lat: f64,
}

impl Tile {
    /// Tile containing `point` at `zoom`.
    pub fn containing(point: GeoPoint, zoom: u8) -> Self {
        let (x, y) = projection::lon_lat_to_tile(point.lon, point.lat, zoom);
        Self { zoom, x, y, lon: point.lon, lat: point.lat }
    }

    pub fn index(&self) -> TileIndex {
        TileIndex::new(self.x, self.y)
    }

    /// Absolute index difference on each axis; not a geographic distance.
    pub fn distance(&self, other: &Tile) -> (i32, i32) {
        ((self.x - other.x).abs(), (self.y - other.y).abs())
    }
}
