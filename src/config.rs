use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Hypsometric relief tiles.
pub const DEFAULT_TILE_URL: &str = "https://maptiles.glidercheck.com/hypsometric/{z}/{x}/{y}.jpeg";

/// What the pipeline does when some tiles could not be downloaded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail the whole render.
    #[default]
    Abort,
    /// Draw a background-coloured tile in place of each failed one.
    BlankTile,
}

/// Configuration for talking to the tile server
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub url_template: String,     // URL with {z}, {x} and {y} placeholders
    pub retries: u32,             // Extra attempts per tile after the first
    pub retry_backoff_ms: u64,    // Wait before retry n is n times this
    pub timeout_secs: u64,        // Per-request timeout
    pub concurrency: Option<usize>, // Worker count, None = one per tile
    pub refresh: bool,            // Ignore tiles already in the cache
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_TILE_URL.to_string(),
            retries: 2,
            retry_backoff_ms: 500,
            timeout_secs: 30,
            concurrency: None,
            refresh: false,
        }
    }
}

/// Crop window settings
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct CropConfig {
    /// Fraction the min pixel is shrunk and the max pixel grown by.
    pub padding: f64,
    /// Smallest side length of the output square.
    pub min_side: u32,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            padding: 0.1,
            min_side: 480,
        }
    }
}

/// How markers and lines are painted on the mosaic
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    pub marker_radius: u32,
    pub line_width: f32,
    pub color: [u8; 3],
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            marker_radius: 5,
            line_width: 2.0,
            color: [220, 20, 60],
        }
    }
}

/// Configuration threaded through every stage of a render
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub root_zoom: u8,       // Zoom the root tile search starts at
    pub max_zoom: u8,        // Deepest zoom the tile server provides
    pub zoom_increase: u8,   // Levels added to the root zoom for the subtile grid
    pub grid_side: u32,      // Subtiles per mosaic row and column
    pub jpeg_quality: u8,
    pub background: [u8; 3], // Fill for blank tiles and crop overflow
    pub failure_policy: FailurePolicy,
    pub fetch: FetchConfig,
    pub crop: CropConfig,
    pub overlay: OverlayStyle,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            root_zoom: 9,      // 9 + 2 stays within the server's 11 levels
            max_zoom: 11,
            zoom_increase: 2,  // 2 levels = 4x4 subtiles
            grid_side: 4,
            jpeg_quality: 90,
            background: [255, 255, 255],
            failure_policy: FailurePolicy::Abort,
            fetch: FetchConfig::default(),
            crop: CropConfig::default(),
            overlay: OverlayStyle::default(),
        }
    }
}

impl RenderConfig {
    /// Load a config file; keys that are absent keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config: RenderConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid_side == 0 {
            return Err(Error::InvalidConfig("grid_side must be at least 1".to_string()));
        }
        let subtiles = 1u32.checked_shl(self.zoom_increase as u32).unwrap_or(0);
        if subtiles == 0 || self.grid_side % subtiles != 0 {
            return Err(Error::InvalidConfig(format!(
                "grid_side {} must be a multiple of 2^zoom_increase (zoom_increase {})",
                self.grid_side, self.zoom_increase
            )));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(Error::InvalidConfig(format!(
                "jpeg_quality {} must be in 1..=100",
                self.jpeg_quality
            )));
        }
        if self.root_zoom > self.max_zoom {
            return Err(Error::InvalidConfig(format!(
                "root_zoom {} exceeds max_zoom {}",
                self.root_zoom, self.max_zoom
            )));
        }
        if !(0.0..1.0).contains(&self.crop.padding) {
            return Err(Error::InvalidConfig(format!(
                "crop padding {} must be in [0, 1)",
                self.crop.padding
            )));
        }
        if self.crop.min_side == 0 {
            return Err(Error::InvalidConfig("crop min_side must be at least 1".to_string()));
        }
        for placeholder in ["{z}", "{x}", "{y}"] {
            if !self.fetch.url_template.contains(placeholder) {
                return Err(Error::InvalidConfig(format!(
                    "tile url template is missing {}",
                    placeholder
                )));
            }
        }
        Ok(())
    }

    /// Zoom levels actually added to `root_zoom`, capped by `max_zoom`.
    pub fn effective_zoom_increase(&self, root_zoom: u8) -> u8 {
        self.zoom_increase.min(self.max_zoom.saturating_sub(root_zoom))
    }

    pub fn tile_count(&self) -> usize {
        (self.grid_side * self.grid_side) as usize
    }
}
