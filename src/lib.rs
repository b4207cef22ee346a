//! Two-image panorama stitching.
//!
//! Facade over the member crates: shared types in [`core`], feature
//! matching in [`features`], warping in [`imgproc`] and the stitching
//! pipeline in [`photo`].

pub use cv_core as core;
pub use cv_features as features;
pub use cv_imgproc as imgproc;
pub use cv_photo as photo;

pub use cv_core::{Error, Result};
pub use cv_photo::{stitch, BlendPolicy, StitchConfig, StitchReport, Stitcher};

/// Initialize a single global Rayon thread pool for all CPU-parallel routines.
///
/// Call this once at application startup before stitching. Repeated calls
/// are idempotent and return the first initialization result.
///
/// Priority order:
/// 1. explicit `num_threads`
/// 2. `RUSTCV_CPU_THREADS` env var
/// 3. Rayon default
pub fn init_thread_pool(num_threads: Option<usize>) -> Result<usize> {
    cv_core::init_global_thread_pool(num_threads)
}
