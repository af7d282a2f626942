use super::*;

#[test]
fn fps_rejects_zero_parts() {
    assert!(Fps::new(0, 1).is_err());
    assert!(Fps::new(60, 0).is_err());
    let fps = Fps::new(30_000, 1001).unwrap();
    assert!((fps.as_f64() - 29.97).abs() < 0.01);
}

#[test]
fn secs_to_frames_ceil_covers_duration() {
    let fps = Fps::integer(60).unwrap();
    assert_eq!(fps.secs_to_frames_ceil(0.0), 0);
    assert_eq!(fps.secs_to_frames_ceil(-1.0), 0);
    assert_eq!(fps.secs_to_frames_ceil(1.0), 60);
    assert_eq!(fps.secs_to_frames_ceil(1.001), 61);
    // 0.1 * 60 carries float noise; an exact multiple must not gain a frame.
    assert_eq!(fps.secs_to_frames_ceil(0.1 * 3.0), 18);
}

#[test]
fn canvas_validates_bounds() {
    assert!(Canvas::new(0, 10).is_err());
    assert!(Canvas::new(70_000, 10).is_err());
    let c = Canvas::new(1080, 1920).unwrap();
    assert!(c.is_portrait());
    assert_eq!(c.rect().width(), 1080.0);
}

#[test]
fn premul_from_straight() {
    let c = Rgba8Premul::from_straight_rgba(255, 128, 0, 128);
    assert_eq!(c.to_array(), [128, 64, 0, 128]);
    assert_eq!(Rgba8Premul::transparent().a, 0);
}
