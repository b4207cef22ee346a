//! Places both images on the planned canvas and records where they overlap.

use crate::planner::CanvasPlan;
use cv_core::{Error, ImageInfo, Rect, Result};
use cv_imgproc::{paste, warp_perspective_forward};
use image::RgbImage;
use rayon::prelude::*;
use tracing::debug;

/// Canvas-sized boolean grid, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlapMask {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

impl OverlapMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![false; width as usize * height as usize],
        }
    }

    /// Marks `rect`, clipped to the grid.
    pub fn from_rect(width: u32, height: u32, rect: Rect) -> Self {
        let mut mask = Self::new(width, height);
        let x1 = rect.right().min(width);
        let y1 = rect.bottom().min(height);
        for y in rect.y.min(y1)..y1 {
            let row = y as usize * width as usize;
            mask.data[row + rect.x.min(x1) as usize..row + x1 as usize].fill(true);
        }
        mask
    }

    /// Pixels with any non-zero channel.
    pub fn from_foreground(img: &RgbImage) -> Self {
        let data = img
            .as_raw()
            .par_chunks_exact(3)
            .map(|px| px.iter().any(|&c| c != 0))
            .collect();
        Self {
            width: img.width(),
            height: img.height(),
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.data
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.data[y as usize * self.width as usize + x as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        if x < self.width && y < self.height {
            self.data[y as usize * self.width as usize + x as usize] = value;
        }
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.data.iter().any(|&v| v)
    }

    pub fn intersect(&self, other: &OverlapMask) -> Result<OverlapMask> {
        if (self.width, self.height) != (other.width, other.height) {
            return Err(Error::DimensionMismatch(format!(
                "mask sizes differ: {}x{} vs {}x{}",
                self.width, self.height, other.width, other.height
            )));
        }
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(&a, &b)| a && b)
            .collect();
        Ok(Self {
            width: self.width,
            height: self.height,
            data,
        })
    }

    /// Copy with everything outside columns `[x0, x1)` cleared.
    pub fn restrict_columns(&self, x0: u32, x1: u32) -> OverlapMask {
        let mut out = self.clone();
        if self.width == 0 {
            return out;
        }
        for row in out.data.chunks_exact_mut(self.width as usize) {
            for (x, v) in row.iter_mut().enumerate() {
                let x = x as u32;
                if x < x0 || x >= x1 {
                    *v = false;
                }
            }
        }
        out
    }

    pub fn bounding_box(&self) -> Option<Rect> {
        if self.width == 0 {
            return None;
        }
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (y, row) in self.data.chunks_exact(self.width as usize).enumerate() {
            let Some(first) = row.iter().position(|&v| v) else {
                continue;
            };
            let last = row.iter().rposition(|&v| v).unwrap_or(first);
            let (y, first, last) = (y as u32, first as u32, last as u32);
            bounds = Some(match bounds {
                None => (first, y, last, y),
                Some((x0, y0, x1, _)) => (x0.min(first), y0, x1.max(last), y),
            });
        }
        bounds.map(|(x0, y0, x1, y1)| Rect::new(x0, y0, x1 - x0 + 1, y1 - y0 + 1))
    }
}

/// Both images on one canvas, before blending.
#[derive(Debug, Clone)]
pub struct Composite {
    /// Warped A with B pasted over it.
    pub canvas: RgbImage,
    /// Warped A alone, as it was before the paste.
    pub warped: RgbImage,
    pub source_mask: OverlapMask,
    pub target_rect: Rect,
    pub overlap: OverlapMask,
}

/// Warps `source` (image A) through the plan's placement, pastes `target`
/// (image B) at the plan's offset and intersects their footprints.
///
/// A's footprint is every canvas pixel with a non-zero channel after the
/// warp, so genuinely black pixels of A do not count as covered.
pub fn composite(source: &RgbImage, target: &RgbImage, plan: &CanvasPlan) -> Result<Composite> {
    ImageInfo::of(source).ensure_non_empty()?;
    let target_info = ImageInfo::of(target);
    target_info.ensure_non_empty()?;

    let warped = warp_perspective_forward(source, &plan.placement, plan.width, plan.height)?;
    let source_mask = OverlapMask::from_foreground(&warped);

    let target_rect = plan.target_rect(target_info);
    let target_mask = OverlapMask::from_rect(plan.width, plan.height, target_rect);
    let overlap = source_mask.intersect(&target_mask)?;

    let mut canvas = warped.clone();
    paste(&mut canvas, target, plan.translation_x, plan.translation_y);

    debug!(
        source_pixels = source_mask.count(),
        overlap_pixels = overlap.count(),
        "composited images"
    );
    Ok(Composite {
        canvas,
        warped,
        source_mask,
        target_rect,
        overlap,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::plan_canvas;
    use cv_core::translation_matrix;
    use image::Rgb;
    use nalgebra::Matrix3;

    fn solid(w: u32, h: u32, v: u8) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([v, v, v]))
    }

    #[test]
    fn mask_bounding_box_and_count() {
        let mut mask = OverlapMask::new(10, 8);
        assert!(mask.is_empty());
        assert_eq!(mask.bounding_box(), None);
        mask.set(3, 2, true);
        mask.set(7, 5, true);
        mask.set(5, 4, true);
        assert_eq!(mask.count(), 3);
        assert_eq!(mask.bounding_box(), Some(Rect::new(3, 2, 5, 4)));
        assert!(!mask.get(20, 20));
    }

    #[test]
    fn rect_mask_is_clipped() {
        let mask = OverlapMask::from_rect(6, 4, Rect::new(4, 2, 10, 10));
        assert_eq!(mask.count(), 4);
        assert_eq!(mask.bounding_box(), Some(Rect::new(4, 2, 2, 2)));
    }

    #[test]
    fn intersect_requires_equal_sizes() {
        let a = OverlapMask::from_rect(5, 5, Rect::new(0, 0, 3, 5));
        let b = OverlapMask::from_rect(5, 5, Rect::new(2, 0, 3, 5));
        assert_eq!(a.intersect(&b).unwrap().count(), 5);
        assert!(matches!(
            a.intersect(&OverlapMask::new(4, 5)),
            Err(Error::DimensionMismatch(_))
        ));
    }

    #[test]
    fn identity_composite_overlaps_fully() {
        let a = solid(100, 100, 128);
        let b = solid(100, 100, 128);
        let plan = plan_canvas(
            ImageInfo::of(&a),
            ImageInfo::of(&b),
            &Matrix3::identity(),
            10,
            u64::MAX,
        )
        .unwrap();
        let comp = composite(&a, &b, &plan).unwrap();
        assert_eq!(comp.canvas.dimensions(), (120, 120));
        assert_eq!(comp.overlap.count(), 100 * 100);
        assert_eq!(comp.overlap.bounding_box(), Some(Rect::new(10, 10, 100, 100)));
        assert_eq!(comp.canvas.get_pixel(9, 50), &Rgb([0, 0, 0]));
        assert_eq!(comp.canvas.get_pixel(50, 50), &Rgb([128, 128, 128]));
    }

    #[test]
    fn target_overwrites_warped_source() {
        let a = solid(40, 20, 50);
        let b = solid(40, 20, 200);
        let h = translation_matrix(-25.0, 0.0);
        let plan = plan_canvas(ImageInfo::of(&a), ImageInfo::of(&b), &h, 2, u64::MAX).unwrap();
        let comp = composite(&a, &b, &plan).unwrap();

        assert_eq!(comp.target_rect, Rect::new(27, 2, 40, 20));
        assert_eq!(comp.overlap.bounding_box(), Some(Rect::new(27, 2, 15, 20)));
        // Inside the overlap the canvas holds B, the warped layer still holds A.
        assert_eq!(comp.canvas.get_pixel(30, 10)[0], 200);
        assert_eq!(comp.warped.get_pixel(30, 10)[0], 50);
        assert_eq!(comp.canvas.get_pixel(5, 10)[0], 50);
    }
}
