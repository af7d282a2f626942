use super::*;

const EPS: f64 = 1e-9;

#[test]
fn zoom_eases_from_one_to_max() {
    assert!((zoom_at(Ease::InOutSine, IMAGE_MAX_ZOOM, 0.0, 0.0, true) - 1.0).abs() < EPS);
    assert!((zoom_at(Ease::InOutSine, IMAGE_MAX_ZOOM, 1.0, 0.0, true) - 1.10).abs() < EPS);
    assert!((zoom_at(Ease::InOutSine, VIDEO_MAX_ZOOM, 0.5, 0.0, true) - 1.025).abs() < EPS);
}

#[test]
fn pulse_requires_animation_and_threshold() {
    let base = zoom_at(Ease::InOutSine, IMAGE_MAX_ZOOM, 0.5, 0.0, true);
    let loud = zoom_at(Ease::InOutSine, IMAGE_MAX_ZOOM, 0.5, 0.8, true);
    assert!((loud - base - 0.8f32 as f64 * PULSE_GAIN).abs() < EPS);
    // Paused frames and quiet narration do not pulse.
    assert_eq!(zoom_at(Ease::InOutSine, IMAGE_MAX_ZOOM, 0.5, 0.8, false), base);
    assert_eq!(zoom_at(Ease::InOutSine, IMAGE_MAX_ZOOM, 0.5, 0.2, true), base);
}

#[test]
fn cover_rect_fills_wide_canvas_from_square_source() {
    let canvas = Canvas {
        width: 1920,
        height: 1080,
    };
    let r = cover_rect(1000, 1000, canvas, 1.0).unwrap();
    assert!((r.width() - 1920.0).abs() < EPS);
    assert!((r.height() - 1920.0).abs() < EPS);
    // Centered: equal overflow above and below.
    assert!((r.y0 + r.y1 - 1080.0).abs() < EPS);
    assert!(r.x0.abs() < EPS);
}

#[test]
fn cover_rect_fills_tall_canvas_and_scales() {
    let canvas = Canvas {
        width: 1080,
        height: 1920,
    };
    let r = cover_rect(1920, 1080, canvas, 1.1).unwrap();
    assert!((r.height() - 1920.0 * 1.1).abs() < 1e-6);
    assert!(r.width() > 1080.0);
    assert!((r.center().x - 540.0).abs() < 1e-6);
    assert!(cover_rect(0, 10, canvas, 1.0).is_none());
}
