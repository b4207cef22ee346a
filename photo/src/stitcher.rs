//! Two-image panorama pipeline.
//!
//! Features of both images are matched, a homography mapping image A onto
//! image B is fitted, and the planner, compositor, blender and cropper turn
//! that transform into a panorama.

use crate::blend::{ExposureBlender, Gain};
use crate::compositor::composite;
use crate::config::StitchConfig;
use crate::crop::crop_black_borders;
use crate::planner::{plan_canvas, CanvasPlan};
use cv_core::{Error, ImageInfo, RgbImage, Result};
use cv_features::{
    good_matches, knn_match, matched_points, FastBriefExtractor, FeatureExtractor,
    HomographySolver, RansacConfig, RansacHomography,
};
use cv_imgproc::convert_rgb_to_gray;
use nalgebra::Matrix3;
use tracing::{debug, info};

/// What one `stitch` call did, stage by stage.
#[derive(Debug, Clone)]
pub struct StitchReport {
    pub keypoints_a: usize,
    pub keypoints_b: usize,
    pub good_matches: usize,
    pub inliers: usize,
    /// Image A's frame onto image B's frame.
    pub homography: Matrix3<f64>,
    pub plan: CanvasPlan,
    pub overlap_pixels: usize,
    pub exposure_gain: Gain,
    pub output_width: u32,
    pub output_height: u32,
}

/// Result of the matching half of the pipeline.
#[derive(Debug, Clone)]
pub struct Registration {
    pub homography: Matrix3<f64>,
    pub keypoints_a: usize,
    pub keypoints_b: usize,
    pub good_matches: usize,
    pub inliers: usize,
}

struct Composed {
    panorama: RgbImage,
    plan: CanvasPlan,
    overlap_pixels: usize,
    gain: Gain,
}

/// Stitches pairs of overlapping images. Holds only configuration and the
/// feature/homography collaborators, so one instance can serve concurrent
/// calls.
pub struct Stitcher {
    config: StitchConfig,
    extractor: Box<dyn FeatureExtractor>,
    solver: Box<dyn HomographySolver>,
}

impl Stitcher {
    pub fn new(config: StitchConfig) -> Result<Self> {
        config.validate()?;
        let seed = config.seed.unwrap_or(0x5eed);
        let extractor = FastBriefExtractor::new(config.fast_threshold, config.max_keypoints, seed);
        let solver = RansacHomography::new(RansacConfig {
            threshold: config.ransac_threshold,
            max_iterations: config.ransac_max_iterations,
            confidence: config.ransac_confidence,
            min_sample_size: 4,
            seed: config.seed,
        });
        Ok(Self {
            config,
            extractor: Box::new(extractor),
            solver: Box::new(solver),
        })
    }

    pub fn with_extractor(mut self, extractor: impl FeatureExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn with_solver(mut self, solver: impl HomographySolver + 'static) -> Self {
        self.solver = Box::new(solver);
        self
    }

    pub fn config(&self) -> &StitchConfig {
        &self.config
    }

    pub fn stitch(&self, img_a: &RgbImage, img_b: &RgbImage) -> Result<RgbImage> {
        self.stitch_with_report(img_a, img_b).map(|(pano, _)| pano)
    }

    pub fn stitch_with_report(
        &self,
        img_a: &RgbImage,
        img_b: &RgbImage,
    ) -> Result<(RgbImage, StitchReport)> {
        let reg = self.register(img_a, img_b)?;
        let composed = self.compose_inner(img_a, img_b, &reg.homography)?;

        let report = StitchReport {
            keypoints_a: reg.keypoints_a,
            keypoints_b: reg.keypoints_b,
            good_matches: reg.good_matches,
            inliers: reg.inliers,
            homography: reg.homography,
            plan: composed.plan,
            overlap_pixels: composed.overlap_pixels,
            exposure_gain: composed.gain,
            output_width: composed.panorama.width(),
            output_height: composed.panorama.height(),
        };
        info!(
            width = report.output_width,
            height = report.output_height,
            good_matches = report.good_matches,
            inliers = report.inliers,
            "stitched panorama"
        );
        Ok((composed.panorama, report))
    }

    /// Estimates the homography taking image A's frame onto image B's.
    pub fn register(&self, img_a: &RgbImage, img_b: &RgbImage) -> Result<Registration> {
        ImageInfo::of(img_a).ensure_non_empty()?;
        ImageInfo::of(img_b).ensure_non_empty()?;

        let desc_a = self.extractor.extract(&convert_rgb_to_gray(img_a));
        let desc_b = self.extractor.extract(&convert_rgb_to_gray(img_b));
        debug!(
            keypoints_a = desc_a.len(),
            keypoints_b = desc_b.len(),
            "extracted features"
        );

        let knn = knn_match(&desc_a, &desc_b, 2, self.extractor.metric());
        let required = self.config.min_good_matches;
        let good = good_matches(&knn, self.config.ratio_test_threshold, required)?;

        let (src, dst) = matched_points(&good, &desc_a, &desc_b);
        let fit = self.solver.fit(&src, &dst).ok_or_else(|| {
            Error::DegenerateTransform(format!(
                "no homography fits {} correspondences",
                src.len()
            ))
        })?;
        if fit.num_inliers < required {
            return Err(Error::InsufficientMatches {
                found: fit.num_inliers,
                required,
            });
        }
        debug!(
            good_matches = good.len(),
            inliers = fit.num_inliers,
            residual = fit.residual,
            "fitted homography"
        );

        Ok(Registration {
            homography: fit.homography,
            keypoints_a: desc_a.len(),
            keypoints_b: desc_b.len(),
            good_matches: good.len(),
            inliers: fit.num_inliers,
        })
    }

    /// Builds the panorama for an already known A-to-B homography.
    pub fn compose(&self, img_a: &RgbImage, img_b: &RgbImage, h: &Matrix3<f64>) -> Result<RgbImage> {
        self.compose_inner(img_a, img_b, h).map(|c| c.panorama)
    }

    fn compose_inner(&self, img_a: &RgbImage, img_b: &RgbImage, h: &Matrix3<f64>) -> Result<Composed> {
        let plan = plan_canvas(
            ImageInfo::of(img_a),
            ImageInfo::of(img_b),
            h,
            self.config.canvas_margin,
            self.config.max_canvas_pixels,
        )?;
        let mut layers = composite(img_a, img_b, &plan)?;
        let blender = ExposureBlender::new(self.config.blend, self.config.exposure_correction);
        let outcome = blender.blend(&mut layers)?;

        let panorama = if self.config.crop_borders {
            crop_black_borders(&layers.canvas)
        } else {
            layers.canvas
        };
        Ok(Composed {
            panorama,
            plan,
            overlap_pixels: layers.overlap.count(),
            gain: outcome.gain,
        })
    }
}

/// One-shot stitch with a fresh [`Stitcher`].
pub fn stitch(img_a: &RgbImage, img_b: &RgbImage, config: &StitchConfig) -> Result<RgbImage> {
    Stitcher::new(config.clone())?.stitch(img_a, img_b)
}
