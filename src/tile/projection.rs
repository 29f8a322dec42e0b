//! Web Mercator conversions between degrees, tile indices and tile pixels.

use std::f64::consts::PI;

/// Fractional tile coordinates of a point; the integer part is the tile index.
pub fn lon_lat_to_tile_fraction(lon: f64, lat: f64, zoom: u8) -> (f64, f64) {
    let n = 2f64.powi(zoom as i32);
    let lat_rad = lat.to_radians();
    let x = (lon + 180.0) / 360.0 * n;
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n;
    (x, y)
}

/// Tile index containing a point. Indices are floored, never rounded.
///
/// At the poles the formula diverges and the cast saturates; callers check
/// points with [`GeoPoint::check_projectable`](super::GeoPoint::check_projectable) first.
pub fn lon_lat_to_tile(lon: f64, lat: f64, zoom: u8) -> (i32, i32) {
    let (x, y) = lon_lat_to_tile_fraction(lon, lat, zoom);
    (x.floor() as i32, y.floor() as i32)
}

/// Upper-left corner of a tile, as (lon, lat). Accepts fractional tile
/// coordinates so callers can sample inside a tile.
pub fn tile_fraction_to_lon_lat(x: f64, y: f64, zoom: u8) -> (f64, f64) {
    let n = 2f64.powi(zoom as i32);
    let lon = x / n * 360.0 - 180.0;
    let m = PI - 2.0 * PI * y / n;
    let lat = m.sinh().atan().to_degrees();
    (lon, lat)
}

/// Upper-left corner of tile (x, y), not its center.
pub fn tile_to_lon_lat(x: i32, y: i32, zoom: u8) -> (f64, f64) {
    tile_fraction_to_lon_lat(x as f64, y as f64, zoom)
}

/// Position of a point in the global pixel space of `zoom`, where every tile
/// is `tile_size` pixels wide.
pub fn geo_to_pixel(lon: f64, lat: f64, zoom: u8, tile_size: f64) -> (f64, f64) {
    let c = tile_size / (2.0 * PI) * 2f64.powi(zoom as i32);
    let lon_rad = lon.to_radians();
    let lat_rad = lat.to_radians();
    let px = c * (lon_rad + PI);
    let py = c * (PI - (PI / 4.0 + lat_rad / 2.0).tan().ln());
    (px, py)
}
