pub use ::image::{GrayImage, Luma, Rgb, RgbImage};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
}

impl ImageInfo {
    pub fn new(width: u32, height: u32, channels: u8) -> Self {
        Self {
            width,
            height,
            channels,
        }
    }

    pub fn of<I: CvImage>(img: &I) -> Self {
        Self::new(img.width(), img.height(), I::CHANNELS)
    }

    /// Rejects zero-sized images, which no stage can place or blend.
    pub fn ensure_non_empty(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::DimensionMismatch(format!(
                "image dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// 8-bit interleaved image buffers the pipeline operates on.
pub trait CvImage: Clone {
    const CHANNELS: u8;

    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

impl CvImage for GrayImage {
    const CHANNELS: u8 = 1;

    fn width(&self) -> u32 {
        self.width()
    }
    fn height(&self) -> u32 {
        self.height()
    }
}

impl CvImage for RgbImage {
    const CHANNELS: u8 = 3;

    fn width(&self) -> u32 {
        self.width()
    }
    fn height(&self) -> u32 {
        self.height()
    }
}
