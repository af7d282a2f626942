use std::path::Path;

use crate::assets::store::AssetView;
use crate::assets::text::TextMeasure;
use crate::foundation::error::{ReelError, ReelResult};
use crate::render::compositor::FramePlan;

/// A rendered frame as RGBA8 pixels.
///
/// Frames are premultiplied alpha; since the background is opaque every composited frame is
/// also fully opaque, so the bytes equal their straight-alpha form.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

impl FrameRGBA {
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        self.data.get(i..i + 4).map(|p| [p[0], p[1], p[2], p[3]])
    }

    /// Straight-alpha copy of the pixels.
    pub fn to_straight_rgba(&self) -> Vec<u8> {
        let mut out = self.data.clone();
        if !self.premultiplied {
            return out;
        }
        for px in out.chunks_exact_mut(4) {
            let a = u16::from(px[3]);
            if a == 0 || a == 255 {
                continue;
            }
            for c in &mut px[..3] {
                *c = ((u16::from(*c) * 255 + a / 2) / a).min(255) as u8;
            }
        }
        out
    }

    pub fn save_png(&self, path: &Path) -> ReelResult<()> {
        let img = image::RgbaImage::from_raw(self.width, self.height, self.to_straight_rgba())
            .ok_or_else(|| ReelError::encode("frame buffer size does not match its dimensions"))?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                ReelError::encode(format!("failed to create '{}': {e}", parent.display()))
            })?;
        }
        img.save(path)
            .map_err(|e| ReelError::encode(format!("failed to write '{}': {e}", path.display())))
    }
}

/// Rasterizer behind the compositor.
///
/// The compositor decides *what* goes where ([`FramePlan`]); a backend turns the plan into
/// pixels and owns whatever caches that needs.
pub trait RasterBackend {
    /// Text measurement consistent with how the backend draws glyphs at `weight`.
    fn text_measure(&mut self, weight: u16) -> &mut dyn TextMeasure;

    fn rasterize(&mut self, plan: &FramePlan, assets: &AssetView<'_>) -> ReelResult<FrameRGBA>;
}
