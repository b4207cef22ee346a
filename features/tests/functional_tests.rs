use cv_core::{Descriptor, Descriptors, FeatureMatch, KeyPoint};
use cv_features::*;
use image::{GrayImage, Luma};
use nalgebra::{Matrix3, Point2};

fn blocks(width: u32, height: u32) -> GrayImage {
    let mut img = GrayImage::from_pixel(width, height, Luma([25]));
    let mut state = 0x2545f491u32;
    for _ in 0..(width * height / 200) {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let x0 = (state >> 8) % width;
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let y0 = (state >> 8) % height;
        let size = 5 + (state >> 4) % 10;
        let tone = 80 + ((state >> 16) % 160) as u8;
        for y in y0..(y0 + size).min(height) {
            for x in x0..(x0 + size).min(width) {
                img.put_pixel(x, y, Luma([tone]));
            }
        }
    }
    img
}

#[test]
fn test_fast_detect_finds_square_corners() {
    let mut img = GrayImage::new(50, 50);
    for y in 15..35 {
        for x in 15..35 {
            img.put_pixel(x, y, Luma([255]));
        }
    }

    let kps = fast_detect(&img, 20, 3, 100);
    assert!(!kps.keypoints.is_empty());
    let near = |cx: f64, cy: f64| {
        kps.keypoints
            .iter()
            .any(|kp| (kp.x - cx).abs() <= 2.0 && (kp.y - cy).abs() <= 2.0)
    };
    assert!(near(15.0, 15.0));
    assert!(near(34.0, 34.0));
}

#[test]
fn test_brute_force_match_basic() {
    let mut query = Descriptors::new();
    let mut train = Descriptors::new();
    let kp = KeyPoint::new(0.0, 0.0);

    query.push(Descriptor::new(vec![0xAA; 32], kp));
    query.push(Descriptor::new(vec![0x55; 32], kp));
    train.push(Descriptor::new(vec![0x55; 32], kp));
    train.push(Descriptor::new(vec![0xAA; 32], kp));

    let knn = knn_match(&query, &train, 2, MatchType::BruteForceHamming);
    let good = ratio_test(&knn, DEFAULT_RATIO);
    assert_eq!(good.len(), 2);
    let pairs: Vec<(usize, usize)> = good.iter().map(|m| (m.query_idx, m.train_idx)).collect();
    assert_eq!(pairs, vec![(0, 1), (1, 0)]);
}

#[test]
fn test_ratio_test_never_keeps_ambiguous_match() {
    let knn: Vec<Vec<FeatureMatch>> = (0..40)
        .map(|i| {
            let d1 = i as f32;
            let d2 = 20.0 + (i % 7) as f32;
            vec![FeatureMatch::new(i, 0, d1), FeatureMatch::new(i, 1, d2)]
        })
        .collect();
    let good = ratio_test(&knn, 0.75);
    assert!(!good.is_empty());
    for m in &good {
        let second = knn[m.query_idx][1].distance;
        assert!(m.distance < 0.75 * second);
    }
}

#[test]
fn test_shifted_views_recover_translation() {
    let scene = blocks(220, 120);
    let a = image::imageops::crop_imm(&scene, 0, 0, 150, 120).to_image();
    let b = image::imageops::crop_imm(&scene, 70, 0, 150, 120).to_image();

    let extractor = FastBriefExtractor::default();
    let desc_a = extractor.extract(&a);
    let desc_b = extractor.extract(&b);
    assert!(desc_a.len() >= 4 && desc_b.len() >= 4);

    let knn = knn_match(&desc_a, &desc_b, 2, extractor.metric());
    let good = good_matches(&knn, DEFAULT_RATIO, 4).unwrap();
    let (src, dst) = matched_points(&good, &desc_a, &desc_b);

    let solver = RansacHomography::new(RansacConfig::default().with_seed(11));
    let fit = solver.fit(&src, &dst).unwrap();
    assert!(fit.num_inliers >= 4);

    let expected = Matrix3::new(1.0, 0.0, -70.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
    let p = cv_core::project_point(&fit.homography, &Point2::new(100.0, 60.0)).unwrap();
    let q = cv_core::project_point(&expected, &Point2::new(100.0, 60.0)).unwrap();
    assert!((p - q).norm() < 1.0, "fitted {}", fit.homography);
}

#[test]
fn test_detect_and_compute_is_deterministic() {
    let img = blocks(80, 80);
    let first = detect_and_compute(&img, 20, 500);
    let second = detect_and_compute(&img, 20, 500);
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.data, b.data);
        assert_eq!(a.keypoint.pt(), b.keypoint.pt());
    }
}
