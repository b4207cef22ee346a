use cv_core::Rect;
use image::imageops;
use image::RgbImage;
use rayon::prelude::*;
use tracing::debug;

/// Smallest rectangle holding every pixel with a non-zero channel.
pub fn foreground_bounds(img: &RgbImage) -> Option<Rect> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    let row_len = width as usize * 3;
    img.as_raw()
        .par_chunks(row_len)
        .enumerate()
        .filter_map(|(y, row)| {
            let lit = |px: &[u8]| px.iter().any(|&c| c > 0);
            let first = row.chunks_exact(3).position(lit)?;
            let last = row.chunks_exact(3).rposition(lit).unwrap_or(first);
            Some((first as u32, y as u32, last as u32, y as u32))
        })
        .reduce_with(|(ax0, ay0, ax1, ay1), (bx0, by0, bx1, by1)| {
            (ax0.min(bx0), ay0.min(by0), ax1.max(bx1), ay1.max(by1))
        })
        .map(|(x0, y0, x1, y1)| Rect::new(x0, y0, x1 - x0 + 1, y1 - y0 + 1))
}

/// Trims all-black margin. An image with no foreground comes back unchanged.
pub fn crop_black_borders(img: &RgbImage) -> RgbImage {
    match foreground_bounds(img) {
        None => {
            debug!(
                width = img.width(),
                height = img.height(),
                "no foreground to crop to; keeping image as is"
            );
            img.clone()
        }
        Some(r) => {
            debug!(x = r.x, y = r.y, width = r.width, height = r.height, "cropping borders");
            imageops::crop_imm(img, r.x, r.y, r.width, r.height).to_image()
        }
    }
}
