use image::imageops;
use image::{Rgb, RgbImage};

use crate::config::CropConfig;

/// Square crop window, anchored at its top-left corner
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropWindow {
    pub x: i64,
    pub y: i64,
    pub side: u32,
}

/// Window around `pixels`: the min pixel is scaled by `1 - padding` and the
/// max pixel by `1 + padding`, which assumes non-negative pixel positions. The
/// side is the larger padded extent, at least `min_side`. The anchor is the
/// padded min pixel; the region is not re-centred inside the square.
pub fn crop_window(pixels: &[(f64, f64)], config: &CropConfig) -> CropWindow {
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for &(x, y) in pixels {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    if pixels.is_empty() {
        (min_x, min_y, max_x, max_y) = (0.0, 0.0, 0.0, 0.0);
    }

    min_x *= 1.0 - config.padding;
    min_y *= 1.0 - config.padding;
    max_x *= 1.0 + config.padding;
    max_y *= 1.0 + config.padding;

    let extent = (max_x - min_x).abs().max((max_y - min_y).abs());
    let side = (extent.floor() as u32).max(config.min_side);

    CropWindow {
        x: min_x.floor() as i64,
        y: min_y.floor() as i64,
        side,
    }
}

impl CropWindow {
    /// Shift the anchor so the window stays on an image of `width x height`
    /// where it fits; where it does not, the anchor goes to 0.
    pub fn clamp_to(self, width: u32, height: u32) -> Self {
        let max_x = (width as i64 - self.side as i64).max(0);
        let max_y = (height as i64 - self.side as i64).max(0);
        Self {
            x: self.x.clamp(0, max_x),
            y: self.y.clamp(0, max_y),
            side: self.side,
        }
    }
}

/// Cut a `side x side` square out of `image`. Parts of the window the image
/// does not cover are filled with `background`.
pub fn crop_to_region(image: &RgbImage, window: CropWindow, background: Rgb<u8>) -> RgbImage {
    let window = window.clamp_to(image.width(), image.height());
    let (x, y) = (window.x as u32, window.y as u32);
    let width = window.side.min(image.width() - x);
    let height = window.side.min(image.height() - y);

    let mut output = RgbImage::from_pixel(window.side, window.side, background);
    let region = imageops::crop_imm(image, x, y, width, height).to_image();
    imageops::replace(&mut output, &region, 0, 0);
    output
}
