use std::sync::Arc;

use anyhow::Context;
use base64::Engine as _;

use crate::assets::media::AudioPcm;
use crate::foundation::error::{ReelError, ReelResult};

/// Prepared raster image in premultiplied RGBA8 form.
#[derive(Clone, Debug)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8.
    pub rgba8_premul: Arc<Vec<u8>>,
}

/// Sample layout of raw narration payloads.
///
/// Narration arrives as headerless signed 16-bit little-endian PCM; the format is not
/// self-describing, so the producer's rate and channel count are configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self {
            sample_rate: 24_000,
            channels: 1,
        }
    }
}

impl PcmFormat {
    pub fn validate(self) -> ReelResult<Self> {
        if self.sample_rate == 0 {
            return Err(ReelError::validation("pcm sample_rate must be > 0"));
        }
        if self.channels == 0 {
            return Err(ReelError::validation("pcm channels must be > 0"));
        }
        Ok(self)
    }
}

pub fn decode_image(bytes: &[u8]) -> ReelResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| ReelError::asset_decode(format!("decode image from memory: {e}")))?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

pub fn read_image_file(path: &std::path::Path) -> ReelResult<PreparedImage> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("read image '{}'", path.display()))
        .map_err(|e| ReelError::asset_load(format!("{e:#}")))?;
    decode_image(&bytes)
}

/// Decode signed 16-bit little-endian PCM into normalized interleaved `f32`.
///
/// Negative samples divide by 32768 and positive ones by 32767, so both extremes land exactly on
/// -1.0 and 1.0. A trailing odd byte and any partial trailing frame are dropped. Returns
/// `AssetDecode` when no whole frame remains.
pub fn decode_pcm16le(bytes: &[u8], format: PcmFormat) -> ReelResult<AudioPcm> {
    let format = format.validate()?;
    let channels = usize::from(format.channels);
    let sample_count = bytes.len() / 2;
    let frames = sample_count / channels;
    if frames == 0 {
        return Err(ReelError::asset_decode(format!(
            "pcm payload of {} bytes holds no whole {}-channel frame",
            bytes.len(),
            format.channels
        )));
    }

    let usable = frames * channels;
    let mut interleaved = Vec::with_capacity(usable);
    for pair in bytes.chunks_exact(2).take(usable) {
        let s = i16::from_le_bytes([pair[0], pair[1]]);
        interleaved.push(normalize_i16(s));
    }

    Ok(AudioPcm {
        sample_rate: format.sample_rate,
        channels: format.channels,
        interleaved_f32: interleaved,
    })
}

fn normalize_i16(s: i16) -> f32 {
    if s < 0 {
        f32::from(s) / 32768.0
    } else {
        f32::from(s) / 32767.0
    }
}

/// Decode a base64 narration payload, ignoring embedded whitespace (line-wrapped
/// transports are common).
pub fn decode_base64_payload(payload: &str) -> ReelResult<Vec<u8>> {
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return Err(ReelError::asset_decode("empty base64 payload"));
    }
    base64::engine::general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| ReelError::asset_decode(format!("invalid base64 narration payload: {e}")))
}

pub(crate) fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
