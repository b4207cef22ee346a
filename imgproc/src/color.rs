use image::{GrayImage, RgbImage};
use rayon::prelude::*;
use rayon::ThreadPool;

/// ITU-R BT.601 luma weights for R, G and B.
pub const BT601_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

pub fn convert_rgb_to_gray(rgb: &RgbImage) -> GrayImage {
    convert_rgb_to_gray_in_pool(rgb, None)
}

pub fn convert_rgb_to_gray_in_pool(rgb: &RgbImage, pool: Option<&ThreadPool>) -> GrayImage {
    let run = || {
        let (w, h) = rgb.dimensions();
        let mut gray = GrayImage::new(w, h);
        if w == 0 || h == 0 {
            return gray;
        }

        gray.par_chunks_mut(w as usize)
            .zip(rgb.as_raw().par_chunks(w as usize * 3))
            .for_each(|(g_row, rgb_row)| {
                for (g, px) in g_row.iter_mut().zip(rgb_row.chunks_exact(3)) {
                    let luma = BT601_WEIGHTS[0] * px[0] as f32
                        + BT601_WEIGHTS[1] * px[1] as f32
                        + BT601_WEIGHTS[2] * px[2] as f32;
                    *g = luma.round().clamp(0.0, 255.0) as u8;
                }
            });
        gray
    };

    if let Some(p) = pool {
        p.install(run)
    } else {
        run()
    }
}
