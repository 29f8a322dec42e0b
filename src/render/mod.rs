pub mod crop;
pub mod overlay;

pub use crop::{crop_to_region, crop_window, CropWindow};
pub use overlay::{draw_overlay, Overlay};
