use cv_core::{Error, Result};
use cv_features::DEFAULT_RATIO;

/// How the two layers are mixed inside the overlap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlendPolicy {
    /// Fixed weight on every overlap pixel: `alpha` scales the warped
    /// source (A) and `1 - alpha` the pasted target (B) already on the
    /// canvas. `alpha = 1` keeps A, `alpha = 0` keeps B.
    Uniform { alpha: f32 },
    /// Linear ramp across a vertical band of the overlap, from the warped
    /// layer's side (weight 1) to the pasted layer's side (weight 0).
    /// `None` spans the whole overlap.
    Gradient { band_width: Option<u32> },
}

impl Default for BlendPolicy {
    fn default() -> Self {
        BlendPolicy::Uniform { alpha: 0.5 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StitchConfig {
    pub ratio_test_threshold: f32,
    pub canvas_margin: u32,
    pub blend: BlendPolicy,
    pub min_good_matches: usize,
    pub exposure_correction: bool,
    pub crop_borders: bool,
    pub ransac_threshold: f64,
    pub ransac_max_iterations: usize,
    pub ransac_confidence: f64,
    pub max_keypoints: usize,
    pub fast_threshold: u8,
    pub max_canvas_pixels: u64,
    pub seed: Option<u64>,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            ratio_test_threshold: DEFAULT_RATIO,
            canvas_margin: 10,
            blend: BlendPolicy::default(),
            min_good_matches: 4,
            exposure_correction: true,
            crop_borders: true,
            ransac_threshold: 5.0,
            ransac_max_iterations: 2000,
            ransac_confidence: 0.995,
            max_keypoints: 2000,
            fast_threshold: 20,
            max_canvas_pixels: 64_000_000,
            seed: Some(0x5eed),
        }
    }
}

impl StitchConfig {
    pub fn with_ratio_test(mut self, threshold: f32) -> Self {
        self.ratio_test_threshold = threshold;
        self
    }

    pub fn with_canvas_margin(mut self, margin: u32) -> Self {
        self.canvas_margin = margin;
        self
    }

    pub fn with_blend(mut self, blend: BlendPolicy) -> Self {
        self.blend = blend;
        self
    }

    pub fn with_min_good_matches(mut self, min: usize) -> Self {
        self.min_good_matches = min;
        self
    }

    pub fn with_exposure_correction(mut self, enabled: bool) -> Self {
        self.exposure_correction = enabled;
        self
    }

    pub fn with_crop_borders(mut self, enabled: bool) -> Self {
        self.crop_borders = enabled;
        self
    }

    pub fn with_ransac_threshold(mut self, threshold: f64) -> Self {
        self.ransac_threshold = threshold;
        self
    }

    pub fn with_max_keypoints(mut self, max: usize) -> Self {
        self.max_keypoints = max;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let r = self.ratio_test_threshold;
        if !(r > 0.0 && r <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "ratio_test_threshold must be in (0, 1], got {r}"
            )));
        }
        if self.min_good_matches < 4 {
            return Err(Error::InvalidConfig(format!(
                "min_good_matches must be at least 4, got {}",
                self.min_good_matches
            )));
        }
        if self.canvas_margin == 0 {
            return Err(Error::InvalidConfig("canvas_margin must be positive".into()));
        }
        match self.blend {
            BlendPolicy::Uniform { alpha } if !(0.0..=1.0).contains(&alpha) => {
                return Err(Error::InvalidConfig(format!(
                    "blend alpha must be in [0, 1], got {alpha}"
                )));
            }
            BlendPolicy::Gradient {
                band_width: Some(0),
            } => {
                return Err(Error::InvalidConfig("gradient band_width must be positive".into()));
            }
            _ => {}
        }
        if !(self.ransac_threshold > 0.0 && self.ransac_threshold.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "ransac_threshold must be positive, got {}",
                self.ransac_threshold
            )));
        }
        if !(self.ransac_confidence > 0.0 && self.ransac_confidence < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "ransac_confidence must be in (0, 1), got {}",
                self.ransac_confidence
            )));
        }
        if self.ransac_max_iterations == 0 || self.max_keypoints == 0 {
            return Err(Error::InvalidConfig(
                "ransac_max_iterations and max_keypoints must be positive".into(),
            ));
        }
        if self.max_canvas_pixels == 0 {
            return Err(Error::InvalidConfig("max_canvas_pixels must be positive".into()));
        }
        Ok(())
    }
}
