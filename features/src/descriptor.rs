use crate::brief::Brief;
use crate::fast::fast_detect;
use crate::matcher::MatchType;
use cv_core::{Descriptors, GrayImage};

/// Detects keypoints and computes their descriptors in one pass.
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, image: &GrayImage) -> Descriptors;

    /// Distance the descriptors are meant to be compared with.
    fn metric(&self) -> MatchType;
}

/// FAST-9 corners described by a seeded BRIEF pattern.
#[derive(Debug, Clone)]
pub struct FastBriefExtractor {
    pub threshold: u8,
    pub max_keypoints: usize,
    brief: Brief,
}

impl FastBriefExtractor {
    pub fn new(threshold: u8, max_keypoints: usize, seed: u64) -> Self {
        Self {
            threshold,
            max_keypoints,
            brief: Brief::new(32, seed),
        }
    }
}

impl Default for FastBriefExtractor {
    fn default() -> Self {
        Self::new(20, 2000, 0x5eed)
    }
}

impl FeatureExtractor for FastBriefExtractor {
    fn extract(&self, image: &GrayImage) -> Descriptors {
        let kps = fast_detect(image, self.threshold, self.brief.border(), self.max_keypoints);
        self.brief.compute(image, &kps.keypoints)
    }

    fn metric(&self) -> MatchType {
        MatchType::BruteForceHamming
    }
}
