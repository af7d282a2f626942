//! Pixel passes over tightly packed premultiplied RGBA8 buffers.

use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::math::mul_div255_u8;

/// 4x5 row-major color matrix over straight RGBA in `[0, 1]` (last column is an offset).
pub type ColorMatrix = [f32; 20];

pub const IDENTITY_MATRIX: ColorMatrix = [
    1.0, 0.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 0.0, 1.0, 0.0,
];

/// Grade applied to scene visuals.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToneFilter {
    pub contrast: f32,
    pub saturate: f32,
    pub brightness: f32,
}

impl Default for ToneFilter {
    fn default() -> Self {
        Self {
            contrast: 1.05,
            saturate: 1.1,
            brightness: 0.98,
        }
    }
}

impl ToneFilter {
    /// Contrast, then saturation, then brightness, folded into one matrix.
    pub fn matrix(self) -> ColorMatrix {
        let k = self.contrast;
        let contrast = [
            k, 0.0, 0.0, 0.0, 0.5 - 0.5 * k, //
            0.0, k, 0.0, 0.0, 0.5 - 0.5 * k, //
            0.0, 0.0, k, 0.0, 0.5 - 0.5 * k, //
            0.0, 0.0, 0.0, 1.0, 0.0,
        ];
        let s = self.saturate;
        let saturate = [
            0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s, 0.0, 0.0, //
            0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s, 0.0, 0.0, //
            0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0, 0.0,
        ];
        let b = self.brightness;
        let brightness = [
            b, 0.0, 0.0, 0.0, 0.0, //
            0.0, b, 0.0, 0.0, 0.0, //
            0.0, 0.0, b, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0, 0.0,
        ];
        matrix_then(matrix_then(contrast, saturate), brightness)
    }
}

/// Matrix equivalent to applying `first` and then `second`.
pub fn matrix_then(first: ColorMatrix, second: ColorMatrix) -> ColorMatrix {
    let mut out = [0.0f32; 20];
    for row in 0..4 {
        for col in 0..5 {
            let mut acc: f32 = (0..4).map(|k| second[row * 5 + k] * first[k * 5 + col]).sum();
            if col == 4 {
                acc += second[row * 5 + 4];
            }
            out[row * 5 + col] = acc;
        }
    }
    out
}

pub fn color_matrix_rgba8_premul(src: &[u8], dst: &mut [u8], m: ColorMatrix) {
    debug_assert_eq!(src.len(), dst.len());
    for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
        if s[3] == 0 {
            d.copy_from_slice(&[0, 0, 0, 0]);
            continue;
        }
        let pa = f32::from(s[3]) / 255.0;
        let inv_a = 1.0 / pa;
        let r = f32::from(s[0]) / 255.0 * inv_a;
        let g = f32::from(s[1]) / 255.0 * inv_a;
        let b = f32::from(s[2]) / 255.0 * inv_a;

        let out_r = (m[0] * r + m[1] * g + m[2] * b + m[3] * pa + m[4]).clamp(0.0, 1.0);
        let out_g = (m[5] * r + m[6] * g + m[7] * b + m[8] * pa + m[9]).clamp(0.0, 1.0);
        let out_b = (m[10] * r + m[11] * g + m[12] * b + m[13] * pa + m[14]).clamp(0.0, 1.0);
        let out_a = (m[15] * r + m[16] * g + m[17] * b + m[18] * pa + m[19]).clamp(0.0, 1.0);

        d[0] = (out_r * out_a * 255.0).round() as u8;
        d[1] = (out_g * out_a * 255.0).round() as u8;
        d[2] = (out_b * out_a * 255.0).round() as u8;
        d[3] = (out_a * 255.0).round() as u8;
    }
}

pub fn clear_rgba8(buf: &mut [u8], rgba: [u8; 4]) {
    for px in buf.chunks_exact_mut(4) {
        px.copy_from_slice(&rgba);
    }
}

/// Source-over of `src` onto `dst`, both premultiplied and the same size.
pub fn premul_over_in_place(dst: &mut [u8], src: &[u8]) -> ReelResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(ReelError::validation(
            "premul_over_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let sa = u16::from(s[3]);
        if sa == 0 {
            continue;
        }
        let inv = 255u16 - sa;
        d[3] = s[3].saturating_add(mul_div255_u8(u16::from(d[3]), inv));
        for c in 0..3 {
            d[c] = s[c].saturating_add(mul_div255_u8(u16::from(d[c]), inv));
        }
    }
    Ok(())
}

/// Radial darkening mask: transparent inside `0.45 * h`, 60 % black from `0.95 * h` outwards,
/// linear in between, centered on the canvas.
#[derive(Clone, Debug)]
pub struct VignetteMask {
    width: u32,
    height: u32,
    alpha: Vec<u8>,
}

impl VignetteMask {
    pub const INNER_RADIUS: f64 = 0.45;
    pub const OUTER_RADIUS: f64 = 0.95;
    pub const MAX_ALPHA: f64 = 0.6;

    pub fn new(width: u32, height: u32) -> Self {
        let (cx, cy) = (f64::from(width) / 2.0, f64::from(height) / 2.0);
        let r0 = f64::from(height) * Self::INNER_RADIUS;
        let r1 = f64::from(height) * Self::OUTER_RADIUS;
        let mut alpha = Vec::with_capacity((width as usize) * (height as usize));
        for y in 0..height {
            for x in 0..width {
                let dx = f64::from(x) + 0.5 - cx;
                let dy = f64::from(y) + 0.5 - cy;
                let d = (dx * dx + dy * dy).sqrt();
                let t = ((d - r0) / (r1 - r0)).clamp(0.0, 1.0);
                alpha.push((t * Self::MAX_ALPHA * 255.0).round() as u8);
            }
        }
        Self {
            width,
            height,
            alpha,
        }
    }

    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }

    pub fn alpha_at(&self, x: u32, y: u32) -> u8 {
        self.alpha[(y as usize) * (self.width as usize) + (x as usize)]
    }

    /// Composite black at the mask's alpha over `dst`.
    pub fn apply(&self, dst: &mut [u8]) -> ReelResult<()> {
        if dst.len() != self.alpha.len() * 4 {
            return Err(ReelError::validation("vignette mask size mismatch"));
        }
        for (d, &a) in dst.chunks_exact_mut(4).zip(&self.alpha) {
            if a == 0 {
                continue;
            }
            let inv = 255u16 - u16::from(a);
            d[3] = a.saturating_add(mul_div255_u8(u16::from(d[3]), inv));
            for c in &mut d[..3] {
                *c = mul_div255_u8(u16::from(*c), inv);
            }
        }
        Ok(())
    }
}

/// Normalized Gaussian kernel in Q16 fixed point (weights sum to exactly `1 << 16`).
pub fn gaussian_kernel_q16(radius: u32, sigma: f32) -> ReelResult<Vec<u32>> {
    if radius == 0 {
        return Ok(vec![1 << 16]);
    }
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(ReelError::validation("blur sigma must be finite and > 0"));
    }

    let r = radius as i32;
    let denom = 2.0 * f64::from(sigma) * f64::from(sigma);
    let weights_f: Vec<f64> = (-r..=r)
        .map(|i| (-(f64::from(i) * f64::from(i)) / denom).exp())
        .collect();
    let sum: f64 = weights_f.iter().sum();

    let mut weights: Vec<u32> = weights_f
        .iter()
        .map(|wf| ((wf / sum) * 65536.0).round().clamp(0.0, 65536.0) as u32)
        .collect();
    let acc: i64 = weights.iter().map(|&w| i64::from(w)).sum();
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        weights[mid] = (i64::from(weights[mid]) + delta).clamp(0, 65536) as u32;
    }
    Ok(weights)
}

/// Canvas-style shadow blur: radius-`blur` shadows map to a Gaussian with `sigma = blur / 2`.
pub fn shadow_kernel(blur_px: f64) -> ReelResult<Vec<u32>> {
    if !blur_px.is_finite() || blur_px <= 0.0 {
        return gaussian_kernel_q16(0, 1.0);
    }
    let sigma = (blur_px / 2.0) as f32;
    let radius = (f64::from(sigma) * 3.0).ceil() as u32;
    gaussian_kernel_q16(radius, sigma)
}

/// Separable blur of `src` into `dst` using `tmp` as the intermediate.
pub fn blur_rgba8_premul_q16(
    src: &[u8],
    dst: &mut [u8],
    tmp: &mut [u8],
    width: u32,
    height: u32,
    kernel_q16: &[u32],
) {
    if kernel_q16.len() == 1 {
        dst.copy_from_slice(src);
        return;
    }
    horizontal_blur_q16(src, tmp, width, height, kernel_q16);
    vertical_blur_q16(tmp, dst, width, height, kernel_q16);
}

fn horizontal_blur_q16(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    for y in 0..height as i32 {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let sx = (x + ki as i32 - radius).clamp(0, w - 1);
                let idx = ((y * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn vertical_blur_q16(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let sy = (y + ki as i32 - radius).clamp(0, h - 1);
                let idx = ((sy * w + x) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    ((acc + 32768) >> 16).min(255) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/render/effects.rs"]
mod tests;
