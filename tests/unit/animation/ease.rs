use super::*;

#[test]
fn endpoints_are_fixed() {
    for ease in [Ease::Linear, Ease::InOutSine] {
        assert!(ease.apply(0.0).abs() < 1e-12, "{ease:?}");
        assert!((ease.apply(1.0) - 1.0).abs() < 1e-12, "{ease:?}");
    }
}

#[test]
fn in_out_sine_is_symmetric_and_monotonic() {
    assert!((Ease::InOutSine.apply(0.5) - 0.5).abs() < 1e-12);
    let a = Ease::InOutSine.apply(0.25);
    let b = Ease::InOutSine.apply(0.75);
    assert!((a + b - 1.0).abs() < 1e-12);
    let mut prev = 0.0;
    for i in 0..=100 {
        let v = Ease::InOutSine.apply(i as f64 / 100.0);
        assert!(v >= prev);
        prev = v;
    }
}

#[test]
fn input_is_clamped() {
    assert_eq!(Ease::Linear.apply(-3.0), 0.0);
    assert_eq!(Ease::Linear.apply(7.0), 1.0);
}
