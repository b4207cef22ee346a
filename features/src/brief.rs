use cv_core::{Descriptor, Descriptors, GrayImage, KeyPoint};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Half-size of the square patch test points are drawn from.
pub const PATCH_RADIUS: i32 = 15;

/// Binary intensity-comparison descriptor over a smoothed patch.
///
/// The sampling pattern is generated from a seed, so two extractors built
/// with the same seed produce comparable descriptors.
#[derive(Debug, Clone)]
pub struct Brief {
    bytes: usize,
    pattern: Vec<[(i32, i32); 2]>,
}

impl Brief {
    pub fn new(bytes: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let pattern = (0..bytes * 8)
            .map(|_| {
                let mut point = || {
                    (
                        rng.gen_range(-PATCH_RADIUS..=PATCH_RADIUS),
                        rng.gen_range(-PATCH_RADIUS..=PATCH_RADIUS),
                    )
                };
                [point(), point()]
            })
            .collect();

        Self { bytes, pattern }
    }

    /// Minimum distance from the image edge for a fully interior patch.
    pub fn border(&self) -> u32 {
        PATCH_RADIUS as u32 + 1
    }

    pub fn compute(&self, image: &GrayImage, keypoints: &[KeyPoint]) -> Descriptors {
        let mut descriptors = Descriptors::with_capacity(keypoints.len());
        for kp in keypoints {
            descriptors.push(Descriptor::new(self.compute_single(image, kp), *kp));
        }
        descriptors
    }

    fn compute_single(&self, image: &GrayImage, kp: &KeyPoint) -> Vec<u8> {
        let x = kp.x.round() as i32;
        let y = kp.y.round() as i32;

        let mut descriptor = vec![0u8; self.bytes];

        for (i, pair) in self.pattern.iter().enumerate() {
            let v1 = box_sample(image, x + pair[0].0, y + pair[0].1);
            let v2 = box_sample(image, x + pair[1].0, y + pair[1].1);

            if v1 > v2 {
                descriptor[i / 8] |= 1 << (i % 8);
            }
        }

        descriptor
    }
}

impl Default for Brief {
    fn default() -> Self {
        Self::new(32, 0x5eed)
    }
}

/// Sum over the 3x3 neighbourhood; pixels outside the image count as zero.
fn box_sample(image: &GrayImage, x: i32, y: i32) -> u32 {
    let mut sum = 0u32;
    for dy in -1..=1 {
        for dx in -1..=1 {
            sum += get_pixel_safe(image, x + dx, y + dy) as u32;
        }
    }
    sum
}

fn get_pixel_safe(image: &GrayImage, x: i32, y: i32) -> u8 {
    if x >= 0 && x < image.width() as i32 && y >= 0 && y < image.height() as i32 {
        image.get_pixel(x as u32, y as u32)[0]
    } else {
        0
    }
}
