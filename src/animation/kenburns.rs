use crate::animation::ease::Ease;
use crate::foundation::core::{Canvas, Rect};
use crate::foundation::math::lerp;

/// Final push-in for still images.
pub const IMAGE_MAX_ZOOM: f64 = 1.10;
/// Final push-in for video clips.
pub const VIDEO_MAX_ZOOM: f64 = 1.05;
/// Narration level above which the visual pulses.
pub const PULSE_THRESHOLD: f32 = 0.2;
/// Extra scale per unit of narration level.
pub const PULSE_GAIN: f64 = 0.005;

/// Scale applied to a scene's visual at `progress` through the scene.
///
/// The beat pulse is only added while animating (playing or exporting) and when the narration
/// level exceeds [`PULSE_THRESHOLD`].
pub fn zoom_at(ease: Ease, max_zoom: f64, progress: f64, amplitude: f32, animating: bool) -> f64 {
    let zoom = lerp(1.0, max_zoom, ease.apply(progress));
    let pulse = if animating && amplitude > PULSE_THRESHOLD {
        f64::from(amplitude) * PULSE_GAIN
    } else {
        0.0
    };
    zoom + pulse
}

/// Destination rect for a `src_w x src_h` source covering the canvas at `scale`, centered.
///
/// The source is sized by the axis that makes it fill the canvas and overflows on the other
/// axis (center crop).
pub fn cover_rect(src_w: u32, src_h: u32, canvas: Canvas, scale: f64) -> Option<Rect> {
    if src_w == 0 || src_h == 0 {
        return None;
    }
    let (cw, ch) = (f64::from(canvas.width), f64::from(canvas.height));
    let (sw, sh) = (f64::from(src_w), f64::from(src_h));
    let ratio = if cw / ch > sw / sh {
        (cw / sw) * scale
    } else {
        (ch / sh) * scale
    };
    let (dw, dh) = (sw * ratio, sh * ratio);
    let (x0, y0) = (cw / 2.0 - dw / 2.0, ch / 2.0 - dh / 2.0);
    Some(Rect::new(x0, y0, x0 + dw, y0 + dh))
}

#[cfg(test)]
#[path = "../../tests/unit/animation/kenburns.rs"]
mod tests;
