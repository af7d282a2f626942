pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    mul_div255_u16(x, y) as u8
}

/// Linear interpolation between `a` and `b`; `t` is not clamped.
pub(crate) fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Float modulo that always lands in `[0, m)` for positive `m`; returns 0 otherwise.
pub(crate) fn wrap_positive(x: f64, m: f64) -> f64 {
    if !x.is_finite() || !m.is_finite() || m <= 0.0 {
        return 0.0;
    }
    let r = x % m;
    if r < 0.0 { r + m } else { r }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
