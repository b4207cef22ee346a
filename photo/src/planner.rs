//! Canvas planning: how large the panorama must be and where each image lands.
//!
//! Image A (the source) is placed through `T * H`, image B (the target) by the
//! translation `T` alone. Every corner of both images ends up inside the
//! canvas with at least `margin` pixels of border on every side.

use cv_core::{
    is_finite_matrix, project_homogeneous, translation_matrix, Error, ImageInfo, Rect, Result,
    HOMOGENEOUS_EPS,
};
use nalgebra::{Matrix3, Point2};
use tracing::debug;

/// Determinant floor for a unit-norm homography.
const DET_EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasPlan {
    pub width: u32,
    pub height: u32,
    pub translation_x: i64,
    pub translation_y: i64,
    /// `T * H`: image A's pixel frame onto the canvas.
    pub placement: Matrix3<f64>,
}

impl CanvasPlan {
    pub fn translation(&self) -> Matrix3<f64> {
        translation_matrix(self.translation_x as f64, self.translation_y as f64)
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Canvas rectangle occupied by image B.
    pub fn target_rect(&self, target: ImageInfo) -> Rect {
        Rect::new(
            self.translation_x as u32,
            self.translation_y as u32,
            target.width,
            target.height,
        )
    }
}

/// Corners of a `width` x `height` image in clockwise order from the origin.
pub fn image_corners(width: u32, height: u32) -> [Point2<f64>; 4] {
    let (w, h) = (width as f64, height as f64);
    [
        Point2::new(0.0, 0.0),
        Point2::new(w, 0.0),
        Point2::new(w, h),
        Point2::new(0.0, h),
    ]
}

/// Projects the corners of `info` through `h`, rejecting transforms that send
/// any part of the image across the line at infinity.
pub fn project_corners(h: &Matrix3<f64>, info: ImageInfo) -> Result<[Point2<f64>; 4]> {
    check_homography(h)?;

    let corners = image_corners(info.width, info.height);
    let mut out = [Point2::origin(); 4];
    let mut sign = 0.0f64;
    for (dst, corner) in out.iter_mut().zip(corners.iter()) {
        let p = project_homogeneous(h, corner);
        let w = p[2];
        if !w.is_finite() || w.abs() < HOMOGENEOUS_EPS {
            return Err(Error::DegenerateTransform(format!(
                "corner ({}, {}) projects to infinity",
                corner.x, corner.y
            )));
        }
        if sign == 0.0 {
            sign = w.signum();
        } else if w.signum() != sign {
            return Err(Error::DegenerateTransform(
                "image straddles the line at infinity".into(),
            ));
        }
        *dst = Point2::new(p[0] / w, p[1] / w);
        if !dst.x.is_finite() || !dst.y.is_finite() {
            return Err(Error::DegenerateTransform(format!(
                "corner ({}, {}) projects to a non-finite point",
                corner.x, corner.y
            )));
        }
    }
    Ok(out)
}

fn check_homography(h: &Matrix3<f64>) -> Result<()> {
    if !is_finite_matrix(h) {
        return Err(Error::DegenerateTransform(
            "homography has non-finite entries".into(),
        ));
    }
    // Hadamard ratio: |det| over the product of column norms, so scale and
    // large translations do not read as rank loss.
    let columns = h.column(0).norm() * h.column(1).norm() * h.column(2).norm();
    if columns < HOMOGENEOUS_EPS || h.determinant().abs() / columns < DET_EPS {
        return Err(Error::DegenerateTransform("homography is singular".into()));
    }
    Ok(())
}

/// Plans the canvas for placing `source` through `h` next to `target`.
pub fn plan_canvas(
    source: ImageInfo,
    target: ImageInfo,
    h: &Matrix3<f64>,
    margin: u32,
    max_pixels: u64,
) -> Result<CanvasPlan> {
    source.ensure_non_empty()?;
    target.ensure_non_empty()?;

    let projected = project_corners(h, source)?;
    let target_corners = image_corners(target.width, target.height);

    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in projected.iter().chain(target_corners.iter()) {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    let margin = margin as f64;
    let min_x = min_x.floor() - margin;
    let min_y = min_y.floor() - margin;
    let max_x = max_x.ceil() + margin;
    let max_y = max_y.ceil() + margin;

    let width = (max_x - min_x) as u64;
    let height = (max_y - min_y) as u64;
    if width > u32::MAX as u64
        || height > u32::MAX as u64
        || width.saturating_mul(height) > max_pixels
    {
        return Err(Error::CanvasTooLarge {
            width,
            height,
            limit: max_pixels,
        });
    }

    let translation_x = -min_x as i64;
    let translation_y = -min_y as i64;
    let t = translation_matrix(translation_x as f64, translation_y as f64);
    let plan = CanvasPlan {
        width: width as u32,
        height: height as u32,
        translation_x,
        translation_y,
        placement: t * h,
    };
    debug!(
        width = plan.width,
        height = plan.height,
        tx = translation_x,
        ty = translation_y,
        "planned canvas"
    );
    Ok(plan)
}
