//! Planar projective geometry helpers for 3x3 homographies.

use nalgebra::{Matrix3, Point2, Vector3};

/// Homogeneous weights with a smaller magnitude are treated as points at infinity.
pub const HOMOGENEOUS_EPS: f64 = 1e-10;

pub fn translation_matrix(tx: f64, ty: f64) -> Matrix3<f64> {
    Matrix3::new(1.0, 0.0, tx, 0.0, 1.0, ty, 0.0, 0.0, 1.0)
}

pub fn project_homogeneous(h: &Matrix3<f64>, pt: &Point2<f64>) -> Vector3<f64> {
    h * Vector3::new(pt.x, pt.y, 1.0)
}

/// Maps `pt` through `h`, or `None` when it lands on the line at infinity.
pub fn project_point(h: &Matrix3<f64>, pt: &Point2<f64>) -> Option<Point2<f64>> {
    let p = project_homogeneous(h, pt);
    if p[2].abs() < HOMOGENEOUS_EPS {
        return None;
    }
    Some(Point2::new(p[0] / p[2], p[1] / p[2]))
}

pub fn is_finite_matrix(h: &Matrix3<f64>) -> bool {
    h.iter().all(|v| v.is_finite())
}

/// Rescales `h` so that `h[(2, 2)] == 1`, falling back to unit Frobenius norm
/// when that entry vanishes.
pub fn normalize_homography(h: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    if !is_finite_matrix(h) {
        return None;
    }
    let h22 = h[(2, 2)];
    if h22.abs() > HOMOGENEOUS_EPS {
        return Some(h / h22);
    }
    let norm = h.norm();
    (norm > HOMOGENEOUS_EPS).then(|| h / norm)
}

/// Hartley normalization: zero centroid, mean distance sqrt(2) from the origin.
///
/// Returns the normalized points and the similarity `T` with `p_n = T p`.
pub fn normalize_points(points: &[Point2<f64>]) -> Option<(Vec<Point2<f64>>, Matrix3<f64>)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / n;
    let mean_dist = points
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if !mean_dist.is_finite() || mean_dist < HOMOGENEOUS_EPS {
        return None;
    }

    let s = std::f64::consts::SQRT_2 / mean_dist;
    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = points
        .iter()
        .map(|p| Point2::new(s * (p.x - cx), s * (p.y - cy)))
        .collect();
    Some((normalized, t))
}

/// Axis-aligned pixel rectangle `[x, x + width) x [y, y + height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}
