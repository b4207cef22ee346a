use cv_core::{Error, Result};
use image::RgbImage;
use nalgebra::{Matrix3, Point2};
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderMode {
    Constant(u8),
    Replicate,
}

const CHANNELS: usize = 3;

fn map_coord(coord: isize, len: usize, mode: BorderMode) -> Option<usize> {
    let n = len as isize;
    if n <= 0 {
        return None;
    }

    match mode {
        BorderMode::Constant(_) => {
            if coord < 0 || coord >= n {
                None
            } else {
                Some(coord as usize)
            }
        }
        BorderMode::Replicate => Some(coord.clamp(0, n - 1) as usize),
    }
}

fn sample_pixel(img: &RgbImage, x: isize, y: isize, border: BorderMode) -> [f64; CHANNELS] {
    let width = img.width() as usize;
    let height = img.height() as usize;

    match (map_coord(x, width, border), map_coord(y, height, border)) {
        (Some(ix), Some(iy)) => {
            let base = (iy * width + ix) * CHANNELS;
            let raw = &img.as_raw()[base..base + CHANNELS];
            [raw[0] as f64, raw[1] as f64, raw[2] as f64]
        }
        _ => match border {
            BorderMode::Constant(v) => [v as f64; CHANNELS],
            BorderMode::Replicate => [0.0; CHANNELS],
        },
    }
}

fn get_pixel_bilinear(img: &RgbImage, x: f64, y: f64, border: BorderMode) -> [f64; CHANNELS] {
    let x0 = x.floor() as isize;
    let y0 = y.floor() as isize;
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let v00 = sample_pixel(img, x0, y0, border);
    let v10 = sample_pixel(img, x0 + 1, y0, border);
    let v01 = sample_pixel(img, x0, y0 + 1, border);
    let v11 = sample_pixel(img, x0 + 1, y0 + 1, border);

    let mut out = [0.0; CHANNELS];
    for c in 0..CHANNELS {
        let v0 = v00[c] * (1.0 - fx) + v10[c] * fx;
        let v1 = v01[c] * (1.0 - fx) + v11[c] * fx;
        out[c] = v0 * (1.0 - fy) + v1 * fy;
    }
    out
}

fn interpolate_sample(
    src: &RgbImage,
    x: f64,
    y: f64,
    interpolation: Interpolation,
    border: BorderMode,
) -> [f64; CHANNELS] {
    match interpolation {
        Interpolation::Nearest => {
            sample_pixel(src, x.round() as isize, y.round() as isize, border)
        }
        Interpolation::Linear => get_pixel_bilinear(src, x, y, border),
    }
}

/// Perspective warp by inverse mapping: every destination pixel `(x, y)` is
/// sampled from `src` at `dst_to_src * (x, y, 1)`.
pub fn warp_perspective_ex(
    src: &RgbImage,
    dst_to_src: &Matrix3<f64>,
    width: u32,
    height: u32,
    interpolation: Interpolation,
    border: BorderMode,
) -> RgbImage {
    let mut dst = RgbImage::new(width, height);
    if width == 0 || height == 0 {
        return dst;
    }

    let row_len = width as usize * CHANNELS;
    dst.par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(CHANNELS).enumerate() {
                let Some(src_pt) = transform_point(dst_to_src, &Point2::new(x as f64, y as f64))
                else {
                    continue;
                };
                let val = interpolate_sample(src, src_pt.x, src_pt.y, interpolation, border);
                for (out, v) in px.iter_mut().zip(val) {
                    *out = v.round().clamp(0.0, 255.0) as u8;
                }
            }
        });

    dst
}

pub fn warp_perspective(
    src: &RgbImage,
    dst_to_src: &Matrix3<f64>,
    width: u32,
    height: u32,
) -> RgbImage {
    warp_perspective_ex(
        src,
        dst_to_src,
        width,
        height,
        Interpolation::Linear,
        BorderMode::Constant(0),
    )
}

/// Renders `src` through the forward transform `src_to_dst` into a
/// zero-filled `width` x `height` image.
pub fn warp_perspective_forward(
    src: &RgbImage,
    src_to_dst: &Matrix3<f64>,
    width: u32,
    height: u32,
) -> Result<RgbImage> {
    crate::validate_image_size(width, height)?;
    let inv = src_to_dst.try_inverse().ok_or_else(|| {
        Error::DegenerateTransform("placement transform is not invertible".into())
    })?;
    Ok(warp_perspective(src, &inv, width, height))
}

/// Writes `src` into `dst` with its top-left corner at `(x, y)`, clipping to
/// `dst`'s bounds. Existing pixels are overwritten.
pub fn paste(dst: &mut RgbImage, src: &RgbImage, x: i64, y: i64) {
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + src.width() as i64).min(dst.width() as i64);
    let y1 = (y + src.height() as i64).min(dst.height() as i64);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let dst_w = dst.width() as usize;
    let raw: &mut [u8] = dst;
    let src_w = src.width() as usize;
    let span = (x1 - x0) as usize * CHANNELS;
    for dy in y0..y1 {
        let sy = (dy - y) as usize;
        let sx = (x0 - x) as usize;
        let s = (sy * src_w + sx) * CHANNELS;
        let d = (dy as usize * dst_w + x0 as usize) * CHANNELS;
        raw[d..d + span].copy_from_slice(&src.as_raw()[s..s + span]);
    }
}

fn transform_point(matrix: &Matrix3<f64>, pt: &Point2<f64>) -> Option<Point2<f64>> {
    cv_core::project_point(matrix, pt)
}
