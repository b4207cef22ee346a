use cv_core::translation_matrix;
use cv_photo::*;
use image::{imageops, Rgb, RgbImage};
use nalgebra::Matrix3;

/// Dark background scattered with bright rectangles of varying size and tone.
fn block_texture(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut state = seed;
    let mut next = move |bound: u32| {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        (state % bound as u64) as u32
    };

    let mut img = RgbImage::from_pixel(width, height, Rgb([30, 30, 30]));
    for _ in 0..(width * height / 250) {
        let w = 6 + next(14);
        let h = 6 + next(14);
        let x0 = next(width);
        let y0 = next(height);
        let tone = [60 + next(120) as u8, 60 + next(120) as u8, 60 + next(120) as u8];
        for y in y0..(y0 + h).min(height) {
            for x in x0..(x0 + w).min(width) {
                img.put_pixel(x, y, Rgb(tone));
            }
        }
    }
    img
}

fn crop(img: &RgbImage, x: u32, width: u32) -> RgbImage {
    imageops::crop_imm(img, x, 0, width, img.height()).to_image()
}

#[test]
fn test_identical_gray_images_with_identity() {
    let a = RgbImage::from_pixel(100, 100, Rgb([128, 128, 128]));
    let b = a.clone();

    let plan = plan_canvas(
        cv_core::ImageInfo::of(&a),
        cv_core::ImageInfo::of(&b),
        &Matrix3::identity(),
        10,
        u64::MAX,
    )
    .unwrap();
    assert_eq!((plan.width, plan.height), (120, 120));

    let mut layers = composite(&a, &b, &plan).unwrap();
    let outcome = ExposureBlender::default().blend(&mut layers).unwrap();
    assert_eq!(outcome.blended_pixels, 100 * 100);
    assert!(layers
        .overlap
        .as_slice()
        .iter()
        .zip(layers.canvas.pixels())
        .filter(|&(&m, _)| m)
        .all(|(_, p)| p.0 == [128, 128, 128]));

    let pano = crop_black_borders(&layers.canvas);
    assert_eq!(pano, a);

    let stitcher = Stitcher::new(StitchConfig::default()).unwrap();
    assert_eq!(stitcher.compose(&a, &b, &Matrix3::identity()).unwrap(), a);
}

#[test]
fn test_featureless_images_fail_with_insufficient_matches() {
    let a = RgbImage::from_pixel(120, 90, Rgb([200, 10, 10]));
    let b = RgbImage::from_pixel(120, 90, Rgb([10, 200, 10]));
    let err = stitch(&a, &b, &StitchConfig::default()).unwrap_err();
    assert!(
        matches!(err, Error::InsufficientMatches { required: 4, .. }),
        "unexpected error: {err}"
    );
    assert!(err.is_recoverable());
}

#[test]
fn test_stitch_overlapping_crops() {
    let scene = block_texture(240, 120, 0x9e3779b97f4a7c15);
    let left = crop(&scene, 0, 160);
    let right = crop(&scene, 80, 160);

    let stitcher = Stitcher::new(StitchConfig::default()).unwrap();
    let (pano, report) = stitcher.stitch_with_report(&left, &right).unwrap();

    assert!(report.good_matches >= 4);
    assert!(report.inliers >= 4);
    let h = report.homography;
    assert!((h[(0, 2)] + 80.0).abs() < 1.0, "homography {h}");
    assert!(h[(1, 2)].abs() < 1.0, "homography {h}");

    let (w, ht) = pano.dimensions();
    assert!((239..=241).contains(&w), "panorama width {w}");
    assert!((119..=121).contains(&ht), "panorama height {ht}");
    assert!(report.overlap_pixels > 70 * 110);
}

#[test]
fn test_exposure_matches_brighter_target() {
    let scene = block_texture(200, 80, 42);
    let left = crop(&scene, 0, 120);
    let mut right = crop(&scene, 80, 120);
    for p in right.pixels_mut() {
        for c in p.0.iter_mut() {
            *c = (*c as f32 * 1.3).round() as u8;
        }
    }

    let h = translation_matrix(-80.0, 0.0);
    let config = StitchConfig::default().with_crop_borders(false);
    let stitcher = Stitcher::new(config).unwrap();
    let pano = stitcher.compose(&left, &right, &h).unwrap();

    // Canvas: A spans x in [-80, 40) of B's frame, so B starts at column 90.
    assert_eq!(pano.dimensions(), (220, 100));
    for y in [15u32, 40, 70] {
        // A-only region is untouched.
        assert_eq!(pano.get_pixel(30, y), left.get_pixel(20, y - 10));
        // Overlap lands close to the brighter target.
        let blended = pano.get_pixel(110, y);
        let target = right.get_pixel(20, y - 10);
        for c in 0..3 {
            assert!(
                (blended[c] as i32 - target[c] as i32).abs() <= 3,
                "{blended:?} vs {target:?}"
            );
        }
    }
}

#[test]
fn test_gradient_policy_runs_end_to_end() {
    let scene = block_texture(200, 80, 7);
    let left = crop(&scene, 0, 120);
    let right = crop(&scene, 80, 120);
    let config = StitchConfig::default().with_blend(BlendPolicy::Gradient {
        band_width: Some(16),
    });
    let pano = Stitcher::new(config)
        .unwrap()
        .compose(&left, &right, &translation_matrix(-80.0, 0.0))
        .unwrap();
    assert_eq!(pano, scene);
}

#[test]
fn test_gradient_band_with_source_on_right() {
    let scene = block_texture(200, 80, 11);
    let target = crop(&scene, 0, 120);
    let mut source = crop(&scene, 80, 120);
    for p in source.pixels_mut() {
        for c in p.0.iter_mut() {
            *c = (*c as f32 * 0.7).round() as u8;
        }
    }

    let plan = plan_canvas(
        cv_core::ImageInfo::of(&source),
        cv_core::ImageInfo::of(&target),
        &translation_matrix(80.0, 0.0),
        10,
        u64::MAX,
    )
    .unwrap();
    assert_eq!((plan.width, plan.height), (220, 100));

    let mut layers = composite(&source, &target, &plan).unwrap();
    let before = layers.canvas.clone();
    let blender = ExposureBlender::new(BlendPolicy::Gradient { band_width: Some(16) }, true);
    let outcome = blender.blend(&mut layers).unwrap();

    // Overlap covers columns [90, 130); the band hugs B's right edge.
    let band = Band {
        x: 114,
        width: 16,
        source_on_left: false,
    };
    assert_eq!(outcome.band, Some(band));
    let region = layers.overlap.restrict_columns(band.x, band.right());
    let gain = exposure_gain(&layers.warped, &before, &region).unwrap();
    assert_eq!(outcome.gain, gain);
    assert!(gain.iter().all(|&g| g > 1.3 && g < 1.6), "{gain:?}");

    for y in 10..90 {
        let a = layers.warped.get_pixel(129, y);
        let boosted = layers.canvas.get_pixel(129, y);
        for c in 0..3 {
            let expected = (a[c] as f32 * gain[c]).clamp(0.0, 255.0).round() as u8;
            assert_eq!(boosted[c], expected, "row {y}");
        }
        assert_eq!(layers.canvas.get_pixel(114, y), before.get_pixel(114, y));
    }
    for (x, y, p) in layers.canvas.enumerate_pixels() {
        if x < band.x || x >= band.right() {
            assert_eq!(p, before.get_pixel(x, y), "({x}, {y})");
        }
    }
}

#[test]
fn test_degenerate_homography_is_rejected() {
    let a = RgbImage::from_pixel(50, 50, Rgb([9, 9, 9]));
    let stitcher = Stitcher::new(StitchConfig::default()).unwrap();
    let err = stitcher.compose(&a, &a, &Matrix3::zeros()).unwrap_err();
    assert!(matches!(err, Error::DegenerateTransform(_)));
}
