use super::*;

#[test]
fn mul_div255_rounds() {
    assert_eq!(mul_div255_u16(255, 255), 255);
    assert_eq!(mul_div255_u16(128, 255), 128);
    assert_eq!(mul_div255_u8(0, 200), 0);
}

#[test]
fn wrap_positive_handles_negatives_and_degenerate_modulus() {
    assert!((wrap_positive(12.5, 10.0) - 2.5).abs() < 1e-12);
    assert!((wrap_positive(-1.0, 10.0) - 9.0).abs() < 1e-12);
    assert_eq!(wrap_positive(3.0, 0.0), 0.0);
    assert_eq!(wrap_positive(f64::NAN, 4.0), 0.0);
}

#[test]
fn lerp_endpoints() {
    assert_eq!(lerp(2.0, 4.0, 0.0), 2.0);
    assert_eq!(lerp(2.0, 4.0, 1.0), 4.0);
}
