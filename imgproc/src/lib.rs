//! Color conversion and perspective warping for RGB panorama layers.

pub mod color;
pub mod geometry;

pub use color::*;
pub use geometry::*;

pub use cv_core::{Error, Result};

/// Rejects output sizes no warp can fill.
pub fn validate_image_size(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::DimensionMismatch(format!(
            "output size must be non-zero, got {width}x{height}"
        )));
    }
    Ok(())
}
