use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;

use crate::config::OverlayStyle;
use crate::error::Result;
use crate::tile::{BoundingBox, GeoPoint};

/// Geometry painted on top of the mosaic
#[derive(Clone, Debug, PartialEq)]
pub enum Overlay {
    /// The two corners of a bounding box, joined by a line
    Corners(BoundingBox),
    /// A track, drawn as a polyline through its points
    Path(Vec<GeoPoint>),
}

impl Overlay {
    pub fn points(&self) -> Vec<GeoPoint> {
        match self {
            Overlay::Corners(bbox) => vec![bbox.min_corner(), bbox.max_corner()],
            Overlay::Path(points) => points.clone(),
        }
    }

    /// Box the root tile search has to frame
    pub fn bbox(&self) -> Result<BoundingBox> {
        match self {
            Overlay::Corners(bbox) => Ok(*bbox),
            Overlay::Path(points) => BoundingBox::from_points(points),
        }
    }
}

/// Paint markers at `pixels` and lines between consecutive ones.
///
/// `pixels` must already be in the canvas' local pixel space. Anything falling
/// outside the canvas is clipped.
pub fn draw_overlay(image: &mut RgbImage, pixels: &[(f64, f64)], style: &OverlayStyle) {
    let color = Rgb(style.color);

    for pair in pixels.windows(2) {
        let start = (pair[0].0 as f32, pair[0].1 as f32);
        let end = (pair[1].0 as f32, pair[1].1 as f32);
        draw_thick_line_segment_mut(image, start, end, color, style.line_width);
    }

    if style.marker_radius > 0 {
        let radius = style.marker_radius as i32;
        for &(x, y) in pixels {
            let center = (x as i32, y as i32);
            draw_hollow_circle_mut(image, center, radius, color);
            if style.line_width > 1.0 {
                draw_hollow_circle_mut(image, center, radius + 1, color);
            }
        }
    }
}

/// Segment `width` pixels wide: a filled quad along the segment with a round
/// cap at each end, so consecutive segments join without gaps.
fn draw_thick_line_segment_mut(image: &mut RgbImage, start: (f32, f32), end: (f32, f32), color: Rgb<u8>, width: f32) {
    if width <= 1.0 {
        draw_line_segment_mut(image, start, end, color);
        return;
    }

    let half = width / 2.0;
    let cap = half.round().max(1.0) as i32;
    draw_filled_circle_mut(image, (start.0.round() as i32, start.1.round() as i32), cap, color);
    draw_filled_circle_mut(image, (end.0.round() as i32, end.1.round() as i32), cap, color);

    let (dx, dy) = (end.0 - start.0, end.1 - start.1);
    let length = dx.hypot(dy);
    if length < 1.0 {
        return;
    }
    // Unit normal scaled to half the width.
    let (nx, ny) = (-dy / length * half, dx / length * half);
    let corner = |x: f32, y: f32| Point::new(x.round() as i32, y.round() as i32);
    let quad = [
        corner(start.0 + nx, start.1 + ny),
        corner(end.0 + nx, end.1 + ny),
        corner(end.0 - nx, end.1 - ny),
        corner(start.0 - nx, start.1 - ny),
    ];
    // Too thin to rasterise as a polygon once rounded.
    if quad[0] == quad[3] || quad[0] == quad[1] {
        draw_line_segment_mut(image, start, end, color);
        return;
    }
    draw_polygon_mut(image, &quad, color);
}
