use cv_imgproc::*;
use image::{GrayImage, Luma, Rgb, RgbImage};
use nalgebra::Matrix3;

fn checker(w: u32, h: u32) -> RgbImage {
    RgbImage::from_fn(w, h, |x, y| {
        let v = if (x / 4 + y / 4) % 2 == 0 { 220 } else { 40 };
        Rgb([v, (x * 7) as u8, (y * 11) as u8])
    })
}

#[test]
fn test_geometry_warp_identity() {
    let img = checker(24, 16);
    let warped = warp_perspective(&img, &Matrix3::identity(), 24, 16);
    assert_eq!(warped, img);
}

#[test]
fn test_forward_translation_places_image() {
    let img = checker(10, 10);
    let t = cv_core::translation_matrix(5.0, 3.0);
    let out = warp_perspective_forward(&img, &t, 20, 20).unwrap();

    assert_eq!(out.get_pixel(5, 3), img.get_pixel(0, 0));
    assert_eq!(out.get_pixel(14, 12), img.get_pixel(9, 9));
    assert_eq!(out.get_pixel(4, 3), &Rgb([0, 0, 0]));
    assert_eq!(out.get_pixel(15, 12), &Rgb([0, 0, 0]));
}

#[test]
fn test_forward_warp_rejects_singular_transform() {
    let img = checker(4, 4);
    let singular = Matrix3::new(1.0, 2.0, 0.0, 2.0, 4.0, 0.0, 0.0, 0.0, 1.0);
    assert!(matches!(
        warp_perspective_forward(&img, &singular, 4, 4),
        Err(Error::DegenerateTransform(_))
    ));
}

#[test]
fn test_paste_overwrites_and_clips() {
    let mut canvas = RgbImage::from_pixel(8, 8, Rgb([1, 1, 1]));
    let patch = RgbImage::from_pixel(4, 4, Rgb([200, 100, 50]));
    paste(&mut canvas, &patch, 6, -2);

    assert_eq!(canvas.get_pixel(6, 0), &Rgb([200, 100, 50]));
    assert_eq!(canvas.get_pixel(7, 1), &Rgb([200, 100, 50]));
    assert_eq!(canvas.get_pixel(7, 2), &Rgb([1, 1, 1]));
    assert_eq!(canvas.get_pixel(5, 0), &Rgb([1, 1, 1]));
}

#[test]
fn test_neutral_colors_keep_their_level() {
    let rgb = RgbImage::from_fn(9, 5, |x, y| {
        let v = (x * 20 + y) as u8;
        Rgb([v, v, v])
    });
    let expected = GrayImage::from_fn(9, 5, |x, y| Luma([(x * 20 + y) as u8]));
    assert_eq!(convert_rgb_to_gray(&rgb), expected);
}

#[test]
fn test_validate_image_size() {
    assert!(validate_image_size(3, 2).is_ok());
    assert!(matches!(
        validate_image_size(0, 2),
        Err(Error::DimensionMismatch(_))
    ));
}
