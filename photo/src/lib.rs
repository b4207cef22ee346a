//! Panorama Stitching
//!
//! Combines two overlapping photographs into one image.
//!
//! # Pipeline
//!
//! - **Registration**: FAST/BRIEF features, ratio-tested matches and a
//!   RANSAC homography taking image A onto image B
//! - **Planning**: canvas size and translation so both images fit
//! - **Compositing**: A warped onto the canvas, B pasted over it, overlap mask
//! - **Blending**: exposure-matched uniform or gradient alpha blend
//! - **Cropping**: all-black margins trimmed away
//!
//! # Example
//!
//! ```no_run
//! # use cv_photo::{stitch, StitchConfig};
//! # use image::RgbImage;
//! let left = RgbImage::new(640, 480);
//! let right = RgbImage::new(640, 480);
//! // let panorama = stitch(&left, &right, &StitchConfig::default())?;
//! ```

pub mod blend;
pub mod compositor;
pub mod config;
pub mod crop;
pub mod planner;
pub mod stitcher;

pub use blend::{exposure_gain, linear_blend, Band, BlendOutcome, ExposureBlender, Gain};
pub use compositor::{composite, Composite, OverlapMask};
pub use config::{BlendPolicy, StitchConfig};
pub use crop::{crop_black_borders, foreground_bounds};
pub use planner::{plan_canvas, CanvasPlan};
pub use stitcher::{stitch, Registration, StitchReport, Stitcher};

pub use cv_core::{Error, Result};
