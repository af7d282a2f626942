use super::*;

fn repeat_px(px: [u8; 4], n: usize) -> Vec<u8> {
    let mut out = vec![0u8; n * 4];
    clear_rgba8(&mut out, px);
    out
}

#[test]
fn blur_radius_0_is_identity() {
    let src: Vec<u8> = (0..4 * 3 * 4).map(|i| (i as u8).wrapping_mul(31)).collect();
    let mut dst = vec![0u8; src.len()];
    let mut tmp = vec![0u8; src.len()];
    let k = gaussian_kernel_q16(0, 1.0).unwrap();
    blur_rgba8_premul_q16(&src, &mut dst, &mut tmp, 4, 3, &k);
    assert_eq!(dst, src);
}

#[test]
fn blur_constant_image_is_identity() {
    let src = repeat_px([10, 20, 30, 40], 16 * 7);
    let mut dst = vec![0u8; src.len()];
    let mut tmp = vec![0u8; src.len()];
    let k = shadow_kernel(5.0).unwrap();
    assert!(k.len() > 1);
    assert_eq!(k.iter().sum::<u32>(), 1 << 16);
    blur_rgba8_premul_q16(&src, &mut dst, &mut tmp, 16, 7, &k);
    assert_eq!(dst, src);
}

#[test]
fn blur_spreads_a_single_pixel() {
    let (w, h) = (9u32, 9u32);
    let mut src = vec![0u8; (w * h * 4) as usize];
    let center = ((4 * w + 4) * 4) as usize;
    src[center..center + 4].copy_from_slice(&[255, 255, 255, 255]);
    let mut dst = vec![0u8; src.len()];
    let mut tmp = vec![0u8; src.len()];
    let k = gaussian_kernel_q16(2, 1.0).unwrap();
    blur_rgba8_premul_q16(&src, &mut dst, &mut tmp, w, h, &k);
    assert!(dst[center + 3] < 255);
    let right = center + 4;
    assert!(dst[right + 3] > 0);
}

#[test]
fn identity_matrix_is_identity() {
    let src = [10, 20, 30, 255, 40, 30, 20, 128, 0, 0, 0, 0];
    let mut dst = [0u8; 12];
    color_matrix_rgba8_premul(&src, &mut dst, IDENTITY_MATRIX);
    assert_eq!(&dst[..4], &src[..4]);
    assert_eq!(dst[7], 128);
    assert_eq!(&dst[8..], &[0, 0, 0, 0]);
}

#[test]
fn tone_filter_brightens_contrast_and_keeps_gray_neutral() {
    let m = ToneFilter::default().matrix();
    let mut dst = [0u8; 4];
    color_matrix_rgba8_premul(&[128, 128, 128, 255], &mut dst, m);
    // Gray stays gray; contrast around 0.5 barely moves it, brightness pulls it to ~0.98.
    assert_eq!(dst[0], dst[1]);
    assert_eq!(dst[1], dst[2]);
    assert!((i32::from(dst[0]) - 126).abs() <= 1);

    color_matrix_rgba8_premul(&[200, 60, 60, 255], &mut dst, m);
    // Saturation pushes the dominant channel up and the others down.
    assert!(dst[0] > 200);
    assert!(dst[1] < 60);
}

#[test]
fn matrix_then_composes_in_order() {
    let double = {
        let mut m = IDENTITY_MATRIX;
        m[0] = 2.0;
        m
    };
    let shift = {
        let mut m = IDENTITY_MATRIX;
        m[4] = 0.1;
        m
    };
    // (r * 2) + 0.1 versus (r + 0.1) * 2.
    assert!((matrix_then(double, shift)[4] - 0.1).abs() < 1e-6);
    assert!((matrix_then(shift, double)[4] - 0.2).abs() < 1e-6);
}

#[test]
fn premul_over_opaque_src_replaces_dst() {
    let mut dst = repeat_px([5, 5, 5, 255], 2);
    let src = [255, 0, 0, 255, 0, 0, 0, 0];
    premul_over_in_place(&mut dst, &src).unwrap();
    assert_eq!(&dst[..4], &[255, 0, 0, 255]);
    assert_eq!(&dst[4..], &[5, 5, 5, 255]);
    assert!(premul_over_in_place(&mut dst, &src[..4]).is_err());
}

#[test]
fn vignette_is_clear_in_the_middle_and_dark_at_corners() {
    let mask = VignetteMask::new(200, 100);
    assert_eq!(mask.alpha_at(100, 50), 0);
    let corner = mask.alpha_at(0, 0);
    // Corner distance ~111 px lies beyond 0.95 * h = 95 px.
    assert_eq!(corner, (0.6f64 * 255.0).round() as u8);

    let mut frame = repeat_px([200, 200, 200, 255], 200 * 100);
    mask.apply(&mut frame).unwrap();
    assert_eq!(&frame[(50 * 200 + 100) * 4..(50 * 200 + 100) * 4 + 4], &[200, 200, 200, 255]);
    assert!(frame[0] < 100);
    assert_eq!(frame[3], 255);
}
