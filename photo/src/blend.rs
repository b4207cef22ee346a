//! Exposure-matched alpha blending inside the overlap.
//!
//! Layer A is the warped source image, layer B whatever the canvas holds
//! (the pasted target image inside the overlap). Every blended pixel is
//!
//! ```text
//! out = round(alpha * clip(gain * a) + (1 - alpha) * b)
//! ```
//!
//! where `gain` matches A's per-channel mean brightness to B's over the
//! blended region. Pixels outside the region are never written.

use crate::compositor::{Composite, OverlapMask};
use crate::config::BlendPolicy;
use cv_core::{Error, Rect, Result};
use image::imageops;
use image::RgbImage;
use rayon::prelude::*;
use tracing::{debug, warn};

const CHANNELS: usize = 3;
const MEAN_EPS: f64 = 1e-6;

/// Per-channel brightness multiplier applied to layer A.
pub type Gain = [f32; CHANNELS];

pub const UNIT_GAIN: Gain = [1.0; CHANNELS];

/// Column band of a gradient blend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    pub x: u32,
    pub width: u32,
    /// Layer A lies to the left, so its weight is 1 at the band's left edge.
    pub source_on_left: bool,
}

impl Band {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Weight of layer A at column `x`, or `None` outside the band.
    pub fn alpha(&self, x: u32) -> Option<f32> {
        if x < self.x || x >= self.right() {
            return None;
        }
        if self.width == 1 {
            return Some(1.0);
        }
        let t = (x - self.x) as f32 / (self.width - 1) as f32;
        Some(if self.source_on_left { 1.0 - t } else { t })
    }
}

/// `mean_b / (mean_a + 1e-6)` per channel over `region`; unit gain when the
/// region is empty.
pub fn exposure_gain(layer_a: &RgbImage, layer_b: &RgbImage, region: &OverlapMask) -> Result<Gain> {
    check_layers(layer_a, layer_b, region)?;
    let width = region.width() as usize;
    if width == 0 {
        return Ok(UNIT_GAIN);
    }

    let row_len = width * CHANNELS;
    let (sum_a, sum_b, n) = layer_a
        .as_raw()
        .par_chunks(row_len)
        .zip(layer_b.as_raw().par_chunks(row_len))
        .zip(region.as_slice().par_chunks(width))
        .map(|((a_row, b_row), m_row)| {
            let mut sa = [0u64; CHANNELS];
            let mut sb = [0u64; CHANNELS];
            let mut n = 0u64;
            for ((a, b), _) in a_row
                .chunks_exact(CHANNELS)
                .zip(b_row.chunks_exact(CHANNELS))
                .zip(m_row)
                .filter(|&(_, &m)| m)
            {
                for c in 0..CHANNELS {
                    sa[c] += a[c] as u64;
                    sb[c] += b[c] as u64;
                }
                n += 1;
            }
            (sa, sb, n)
        })
        .reduce(
            || ([0; CHANNELS], [0; CHANNELS], 0),
            |(mut sa, mut sb, n), (ra, rb, rn)| {
                for c in 0..CHANNELS {
                    sa[c] += ra[c];
                    sb[c] += rb[c];
                }
                (sa, sb, n + rn)
            },
        );

    if n == 0 {
        return Ok(UNIT_GAIN);
    }
    let mut gain = UNIT_GAIN;
    for c in 0..CHANNELS {
        let mean_a = sum_a[c] as f64 / n as f64;
        let mean_b = sum_b[c] as f64 / n as f64;
        gain[c] = (mean_b / (mean_a + MEAN_EPS)) as f32;
    }
    Ok(gain)
}

/// Mixes `alpha * A' + (1 - alpha) * B` into `canvas` on every masked pixel.
pub fn blend_uniform(
    canvas: &mut RgbImage,
    layer_a: &RgbImage,
    mask: &OverlapMask,
    alpha: f32,
    gain: Gain,
) -> Result<()> {
    check_layers(layer_a, canvas, mask)?;
    blend_rows(canvas, layer_a, mask, gain, |_| Some(alpha));
    Ok(())
}

/// Ramps from A at the band's leading edge to B at its trailing edge. Masked
/// pixels outside the band are left alone.
pub fn blend_gradient(
    canvas: &mut RgbImage,
    layer_a: &RgbImage,
    mask: &OverlapMask,
    band: Band,
    gain: Gain,
) -> Result<()> {
    check_layers(layer_a, canvas, mask)?;
    blend_rows(canvas, layer_a, mask, gain, |x| band.alpha(x));
    Ok(())
}

/// Blends the leftmost `band_width` columns of two equally sized layers,
/// A fading into B from left to right, and returns that band.
pub fn linear_blend(layer_a: &RgbImage, layer_b: &RgbImage, band_width: u32) -> Result<RgbImage> {
    if layer_a.dimensions() != layer_b.dimensions() {
        return Err(Error::DimensionMismatch(format!(
            "layers differ: {:?} vs {:?}",
            layer_a.dimensions(),
            layer_b.dimensions()
        )));
    }
    let (width, height) = layer_a.dimensions();
    if band_width == 0 || band_width > width {
        return Err(Error::DimensionMismatch(format!(
            "band width {band_width} outside 1..={width}"
        )));
    }

    let a = imageops::crop_imm(layer_a, 0, 0, band_width, height).to_image();
    let mut out = imageops::crop_imm(layer_b, 0, 0, band_width, height).to_image();
    let mask = OverlapMask::from_rect(band_width, height, Rect::new(0, 0, band_width, height));
    let gain = exposure_gain(&a, &out, &mask)?;
    let band = Band {
        x: 0,
        width: band_width,
        source_on_left: true,
    };
    blend_gradient(&mut out, &a, &mask, band, gain)?;
    Ok(out)
}

/// Summary of one blend pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendOutcome {
    pub gain: Gain,
    pub blended_pixels: usize,
    pub band: Option<Band>,
}

/// Applies the configured policy to a composite's overlap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExposureBlender {
    pub policy: BlendPolicy,
    pub exposure_correction: bool,
}

impl Default for ExposureBlender {
    fn default() -> Self {
        Self::new(BlendPolicy::default(), true)
    }
}

impl ExposureBlender {
    pub fn new(policy: BlendPolicy, exposure_correction: bool) -> Self {
        Self {
            policy,
            exposure_correction,
        }
    }

    pub fn blend(&self, composite: &mut Composite) -> Result<BlendOutcome> {
        if composite.overlap.is_empty() {
            warn!("images do not overlap; skipping blend");
            return Ok(BlendOutcome {
                gain: UNIT_GAIN,
                blended_pixels: 0,
                band: None,
            });
        }

        let (region, band) = match self.policy {
            BlendPolicy::Uniform { .. } => (composite.overlap.clone(), None),
            BlendPolicy::Gradient { band_width } => {
                let band = gradient_band(composite, band_width);
                let region = match band {
                    Some(b) => composite.overlap.restrict_columns(b.x, b.right()),
                    None => OverlapMask::new(composite.overlap.width(), composite.overlap.height()),
                };
                (region, band)
            }
        };

        let gain = if self.exposure_correction {
            exposure_gain(&composite.warped, &composite.canvas, &region)?
        } else {
            UNIT_GAIN
        };

        match (self.policy, band) {
            (BlendPolicy::Uniform { alpha }, _) => {
                blend_uniform(&mut composite.canvas, &composite.warped, &region, alpha, gain)?
            }
            (BlendPolicy::Gradient { .. }, Some(band)) => {
                blend_gradient(&mut composite.canvas, &composite.warped, &region, band, gain)?
            }
            (BlendPolicy::Gradient { .. }, None) => {}
        }

        let blended_pixels = region.count();
        debug!(?gain, blended_pixels, ?band, "blended overlap");
        Ok(BlendOutcome {
            gain,
            blended_pixels,
            band,
        })
    }
}

/// Band for a gradient blend over the composite's overlap: the overlap's
/// full column span, or `band_width` columns starting at the edge facing
/// the warped source's exclusive area.
pub fn gradient_band(composite: &Composite, band_width: Option<u32>) -> Option<Band> {
    let overlap = composite.overlap.bounding_box()?;
    let target = composite.target_rect;
    let source_on_left = composite
        .source_mask
        .bounding_box()
        .map_or(true, |s| {
            2 * s.x as u64 + s.width as u64 <= 2 * target.x as u64 + target.width as u64
        });

    let width = band_width.map_or(overlap.width, |w| w.clamp(1, overlap.width));
    let x = if source_on_left {
        overlap.x
    } else {
        overlap.right() - width
    };
    Some(Band {
        x,
        width,
        source_on_left,
    })
}

#[inline]
fn mix(a: u8, b: u8, gain: f32, alpha: f32) -> u8 {
    let a = (a as f32 * gain).clamp(0.0, 255.0);
    (alpha * a + (1.0 - alpha) * b as f32).round().clamp(0.0, 255.0) as u8
}

fn blend_rows<F>(canvas: &mut RgbImage, layer_a: &RgbImage, mask: &OverlapMask, gain: Gain, alpha_at: F)
where
    F: Fn(u32) -> Option<f32> + Sync,
{
    let width = mask.width() as usize;
    if width == 0 {
        return;
    }
    let row_len = width * CHANNELS;
    canvas
        .par_chunks_mut(row_len)
        .zip(layer_a.as_raw().par_chunks(row_len))
        .zip(mask.as_slice().par_chunks(width))
        .for_each(|((out_row, a_row), m_row)| {
            for (x, ((out, a), &m)) in out_row
                .chunks_exact_mut(CHANNELS)
                .zip(a_row.chunks_exact(CHANNELS))
                .zip(m_row)
                .enumerate()
            {
                if !m {
                    continue;
                }
                let Some(alpha) = alpha_at(x as u32) else {
                    continue;
                };
                for c in 0..CHANNELS {
                    out[c] = mix(a[c], out[c], gain[c], alpha);
                }
            }
        });
}

fn check_layers(layer_a: &RgbImage, layer_b: &RgbImage, mask: &OverlapMask) -> Result<()> {
    let dims = (mask.width(), mask.height());
    if layer_a.dimensions() != dims || layer_b.dimensions() != dims {
        return Err(Error::DimensionMismatch(format!(
            "layers {:?} and {:?} do not match mask {:?}",
            layer_a.dimensions(),
            layer_b.dimensions(),
            dims
        )));
    }
    Ok(())
}
