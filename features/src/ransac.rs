//! RANSAC (Random Sample Consensus) for geometric verification
//!
//! RANSAC is used to robustly estimate the homography between two views
//! from feature matches contaminated by outliers.

use cv_core::{
    normalize_homography, normalize_points, project_point, Descriptors, Matches, Ransac,
    RobustConfig, RobustModel, RobustResult,
};
use nalgebra::{DMatrix, Matrix3, Point2};
use tracing::debug;

pub type RansacConfig = RobustConfig;
pub type RansacResult<M> = RobustResult<M>;

/// Normalized homographies with a smaller |det| are rejected as rank deficient.
const MIN_DETERMINANT: f64 = 1e-8;

#[derive(Clone, Debug)]
pub struct MatchPair {
    pub src: Point2<f64>,
    pub dst: Point2<f64>,
}

/// Output of a successful robust fit.
#[derive(Clone, Debug)]
pub struct HomographyFit {
    /// Maps source-frame points to destination-frame points.
    pub homography: Matrix3<f64>,
    pub inliers: Vec<bool>,
    pub num_inliers: usize,
    pub residual: f64,
}

/// Robust projective-transform estimation from point correspondences.
pub trait HomographySolver: Send + Sync {
    /// Returns `None` when no usable transform exists.
    fn fit(&self, src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<HomographyFit>;
}

pub struct HomographyEstimator;

impl RobustModel<MatchPair> for HomographyEstimator {
    type Model = Matrix3<f64>;

    fn min_sample_size(&self) -> usize {
        4
    }

    fn estimate(&self, data: &[&MatchPair]) -> Option<Self::Model> {
        let src: Vec<Point2<f64>> = data.iter().map(|m| m.src).collect();
        let dst: Vec<Point2<f64>> = data.iter().map(|m| m.dst).collect();
        dlt_homography(&src, &dst)
    }

    fn compute_error(&self, model: &Self::Model, data: &MatchPair) -> f64 {
        match project_point(model, &data.src) {
            Some(p) => (p - data.dst).norm(),
            None => f64::INFINITY,
        }
    }
}

/// Normalized Direct Linear Transform over `n >= 4` correspondences.
///
/// Solves `A h = 0` by SVD in Hartley-normalized coordinates and
/// de-normalizes; the result is scaled so that `H[(2, 2)] == 1`.
pub fn dlt_homography(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Matrix3<f64>> {
    let n = src.len();
    if n < 4 || dst.len() != n {
        return None;
    }

    let (src_n, t_src) = normalize_points(src)?;
    let (dst_n, t_dst) = normalize_points(dst)?;
    if is_degenerate_configuration(&src_n) || is_degenerate_configuration(&dst_n) {
        return None;
    }

    // Pad to at least 9 rows so the null vector appears in V^T.
    let rows = (2 * n).max(9);
    let mut a = DMatrix::<f64>::zeros(rows, 9);
    for (i, (p, q)) in src_n.iter().zip(dst_n.iter()).enumerate() {
        let (x1, y1) = (p.x, p.y);
        let (x2, y2) = (q.x, q.y);
        let r1 = 2 * i;
        let r2 = r1 + 1;

        // [-x1, -y1, -1, 0, 0, 0, x2*x1, x2*y1, x2]
        a[(r1, 0)] = -x1;
        a[(r1, 1)] = -y1;
        a[(r1, 2)] = -1.0;
        a[(r1, 6)] = x2 * x1;
        a[(r1, 7)] = x2 * y1;
        a[(r1, 8)] = x2;

        // [0, 0, 0, -x1, -y1, -1, y2*x1, y2*y1, y2]
        a[(r2, 3)] = -x1;
        a[(r2, 4)] = -y1;
        a[(r2, 5)] = -1.0;
        a[(r2, 6)] = y2 * x1;
        a[(r2, 7)] = y2 * y1;
        a[(r2, 8)] = y2;
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let (min_idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))?;
    let h = v_t.row(min_idx);

    let h_n = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);
    let unit = h_n / h_n.norm();
    if !unit.determinant().is_finite() || unit.determinant().abs() < MIN_DETERMINANT {
        return None;
    }

    let t_dst_inv = t_dst.try_inverse()?;
    normalize_homography(&(t_dst_inv * h_n * t_src))
}

/// Collinear configurations leave the DLT under-determined.
///
/// Expects Hartley-normalized points. Minimal samples are rejected when any
/// three points are collinear, larger sets only when all of them are.
fn is_degenerate_configuration(points: &[Point2<f64>]) -> bool {
    const AREA_EPS: f64 = 1e-6;

    if points.len() == 4 {
        let triplets = [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)];
        return triplets.iter().any(|&(i, j, k)| {
            let (a, b, c) = (points[i], points[j], points[k]);
            let area = (b - a).perp(&(c - a)).abs() * 0.5;
            area < AREA_EPS
        });
    }

    // Points are centered, so the second-moment matrix is the covariance.
    let n = points.len() as f64;
    let sxx = points.iter().map(|p| p.x * p.x).sum::<f64>() / n;
    let syy = points.iter().map(|p| p.y * p.y).sum::<f64>() / n;
    let sxy = points.iter().map(|p| p.x * p.y).sum::<f64>() / n;
    let det = sxx * syy - sxy * sxy;
    det.abs() < AREA_EPS
}

/// Estimate homography using RANSAC over matched keypoint positions.
pub fn estimate_homography(
    src_points: &[Point2<f64>],
    dst_points: &[Point2<f64>],
    config: &RansacConfig,
) -> RansacResult<Matrix3<f64>> {
    let data: Vec<MatchPair> = src_points
        .iter()
        .zip(dst_points.iter())
        .map(|(&src, &dst)| MatchPair { src, dst })
        .collect();

    let ransac = Ransac::new(config.clone());
    ransac.run(&HomographyEstimator, &data)
}

/// Source/destination keypoint positions of each match, in match order.
pub fn matched_points(
    matches: &Matches,
    query: &Descriptors,
    train: &Descriptors,
) -> (Vec<Point2<f64>>, Vec<Point2<f64>>) {
    matches
        .iter()
        .filter_map(|m| {
            let src = query.keypoint(m.query_idx)?;
            let dst = train.keypoint(m.train_idx)?;
            Some((src.pt(), dst.pt()))
        })
        .unzip()
}

/// Default solver: seeded RANSAC over the normalized DLT.
#[derive(Debug, Clone)]
pub struct RansacHomography {
    config: RansacConfig,
}

impl RansacHomography {
    pub fn new(config: RansacConfig) -> Self {
        Self { config }
    }
}

impl Default for RansacHomography {
    fn default() -> Self {
        Self::new(RansacConfig {
            threshold: 5.0,
            max_iterations: 2000,
            confidence: 0.995,
            min_sample_size: 4,
            seed: None,
        })
    }
}

impl HomographySolver for RansacHomography {
    fn fit(&self, src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<HomographyFit> {
        let result = estimate_homography(src, dst, &self.config);
        debug!(
            points = src.len(),
            inliers = result.num_inliers,
            iterations = result.iterations,
            residual = result.residual,
            "ransac homography"
        );
        let homography = result.model?;
        Some(HomographyFit {
            homography,
            inliers: result.inliers,
            num_inliers: result.num_inliers,
            residual: result.residual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid_points() -> Vec<Point2<f64>> {
        let mut pts = Vec::new();
        for y in 0..5 {
            for x in 0..5 {
                pts.push(Point2::new(x as f64 * 20.0 + 3.0, y as f64 * 15.0 + 7.0));
            }
        }
        pts
    }

    fn apply(h: &Matrix3<f64>, pts: &[Point2<f64>]) -> Vec<Point2<f64>> {
        pts.iter().map(|p| project_point(h, p).unwrap()).collect()
    }

    fn assert_h_eq(a: &Matrix3<f64>, b: &Matrix3<f64>, eps: f64) {
        for (x, y) in a.iter().zip(b.iter()) {
            assert_relative_eq!(x, y, epsilon = eps);
        }
    }

    #[test]
    fn dlt_recovers_projective_transform_from_four_points() {
        let h = Matrix3::new(1.1, 0.05, 12.0, -0.02, 0.95, -4.0, 1e-4, -2e-4, 1.0);
        let src = vec![
            Point2::new(0.0, 0.0),
            Point2::new(100.0, 0.0),
            Point2::new(100.0, 80.0),
            Point2::new(0.0, 80.0),
        ];
        let dst = apply(&h, &src);
        let est = dlt_homography(&src, &dst).unwrap();
        assert_h_eq(&est, &h, 1e-6);
    }

    #[test]
    fn dlt_rejects_collinear_points() {
        let src: Vec<_> = (0..4).map(|i| Point2::new(i as f64, 2.0 * i as f64)).collect();
        let dst: Vec<_> = (0..4).map(|i| Point2::new(i as f64 + 1.0, 2.0 * i as f64)).collect();
        assert!(dlt_homography(&src, &dst).is_none());
    }

    #[test]
    fn ransac_recovers_translation_with_outliers() {
        let h = cv_core::translation_matrix(10.0, 5.0);
        let src = grid_points();
        let mut dst = apply(&h, &src);
        for (i, p) in dst.iter_mut().enumerate().take(5) {
            *p = Point2::new(400.0 + i as f64 * 37.0, -300.0 + i as f64 * 11.0);
        }

        let config = RansacConfig::default().with_threshold(2.0).with_seed(3);
        let result = estimate_homography(&src, &dst, &config);
        assert_eq!(result.num_inliers, 20);
        assert!(result.inliers[5..].iter().all(|&b| b));
        assert!(result.inliers[..5].iter().all(|&b| !b));
        assert_h_eq(&result.model.unwrap(), &h, 1e-6);
    }

    #[test]
    fn solver_returns_none_without_support() {
        let solver = RansacHomography::default();
        let src = vec![Point2::new(0.0, 0.0); 3];
        assert!(solver.fit(&src, &src).is_none());
    }
}
