//! Locate the slippy-map tiles covering a region, stitch them into one
//! image, and paint a bounding box or flight track on a square crop of it.

pub mod cache;
pub mod config;
pub mod download;
pub mod error;
pub mod mosaic;
pub mod pipeline;
pub mod render;
pub mod tile;
pub mod track;

#[cfg(test)]
mod testutil;

pub use config::{FailurePolicy, RenderConfig};
pub use error::{Error, Result};
pub use pipeline::{RenderOutput, RenderRequest, Renderer};
pub use render::Overlay;
pub use tile::{BoundingBox, GeoPoint, Tile};
pub use track::Track;
