//! FAST-9 corner detection on the 16-pixel Bresenham circle of radius 3.

use cv_core::{GrayImage, KeyPoint, KeyPoints};

const CIRCLE: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

/// Minimum contiguous arc length for a FAST-9 corner.
const ARC_LENGTH: usize = 9;

/// Detects corners at least `border` pixels away from the image edge, keeping
/// the `max_keypoints` strongest after 3x3 non-maximum suppression.
pub fn fast_detect(
    image: &GrayImage,
    threshold: u8,
    border: u32,
    max_keypoints: usize,
) -> KeyPoints {
    let width = image.width() as i32;
    let height = image.height() as i32;
    let margin = border.max(3) as i32;

    if width <= 2 * margin || height <= 2 * margin {
        return KeyPoints::new();
    }

    let mut scores = vec![0u32; (width * height) as usize];
    for y in margin..height - margin {
        for x in margin..width - margin {
            scores[(y * width + x) as usize] = fast_score(image, x, y, threshold);
        }
    }

    let mut keypoints = Vec::new();
    for y in margin..height - margin {
        for x in margin..width - margin {
            let s = scores[(y * width + x) as usize];
            if s > 0 && is_local_max(&scores, width, x, y) {
                keypoints.push(KeyPoint::new(x as f64, y as f64).with_response(s as f64));
            }
        }
    }

    non_maximum_suppression(&mut keypoints, max_keypoints);
    KeyPoints { keypoints }
}

/// Corner strength at `(x, y)`, zero when the pixel is not a FAST-9 corner.
///
/// The caller guarantees the circle lies inside the image.
pub fn fast_score(image: &GrayImage, x: i32, y: i32, threshold: u8) -> u32 {
    let p = image.get_pixel(x as u32, y as u32)[0] as i32;
    let t = threshold as i32;

    let mut diffs = [0i32; 16];
    for (d, &(dx, dy)) in diffs.iter_mut().zip(CIRCLE.iter()) {
        *d = image.get_pixel((x + dx) as u32, (y + dy) as u32)[0] as i32 - p;
    }

    let brighter = longest_arc(&diffs, |d| d > t);
    let darker = longest_arc(&diffs, |d| d < -t);
    if brighter < ARC_LENGTH && darker < ARC_LENGTH {
        return 0;
    }

    let sum = if brighter >= ARC_LENGTH {
        diffs.iter().filter(|&&d| d > t).map(|&d| d - t).sum::<i32>()
    } else {
        diffs.iter().filter(|&&d| d < -t).map(|&d| -d - t).sum::<i32>()
    };
    sum.max(1) as u32
}

/// Longest run of circle positions satisfying `pred`, wrapping around.
fn longest_arc(diffs: &[i32; 16], pred: impl Fn(i32) -> bool) -> usize {
    let mut best = 0;
    let mut run = 0;
    for i in 0..32 {
        if pred(diffs[i % 16]) {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    best.min(16)
}

fn is_local_max(scores: &[u32], width: i32, x: i32, y: i32) -> bool {
    let s = scores[(y * width + x) as usize];
    for dy in -1..=1 {
        for dx in -1..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let n = scores[((y + dy) * width + (x + dx)) as usize];
            // Ties resolve toward the earlier raster position.
            if n > s || (n == s && (dy < 0 || (dy == 0 && dx < 0))) {
                return false;
            }
        }
    }
    true
}

/// Keeps the `max_keypoints` strongest responses, strongest first.
pub fn non_maximum_suppression(keypoints: &mut Vec<KeyPoint>, max_keypoints: usize) {
    keypoints.sort_by(|a, b| {
        b.response
            .partial_cmp(&a.response)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal))
            .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
    });
    keypoints.truncate(max_keypoints);
}
