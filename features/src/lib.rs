//! Feature detection, description and matching.
//!
//! The pieces a two-view pipeline needs before geometry takes over:
//! FAST corners, BRIEF descriptors, brute-force k-nearest-neighbour
//! matching with Lowe's ratio test, and RANSAC homography fitting.

pub mod brief;
pub mod descriptor;
pub mod fast;
pub mod matcher;
pub mod ransac;

pub use brief::Brief;
pub use descriptor::{FastBriefExtractor, FeatureExtractor};
pub use fast::*;
pub use matcher::*;
pub use ransac::*;

pub use cv_core::{Error, Result};

use cv_core::{Descriptors, GrayImage};

pub fn detect_and_compute(image: &GrayImage, threshold: u8, max_keypoints: usize) -> Descriptors {
    FastBriefExtractor::new(threshold, max_keypoints, 0x5eed).extract(image)
}
