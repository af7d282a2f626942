use std::path::Path;

use crate::audio::graph::{Schedule, ScheduledSource, SourceRole};
use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::math::wrap_positive;

/// Render `frames` output frames of the schedule starting at context time `t0`.
///
/// Output is interleaved with `channels` channels (1 or 2) and clamped to `[-1, 1]`.
pub(crate) fn render_schedule(
    schedule: &Schedule,
    t0: f64,
    frames: usize,
    sample_rate: u32,
    channels: u16,
) -> Vec<f32> {
    let mut out = vec![0.0f32; frames * usize::from(channels)];
    mix_into(&mut out, schedule, t0, sample_rate, channels, None);
    for s in &mut out {
        *s = s.clamp(-1.0, 1.0);
    }
    out
}

/// Add every source (or only those with `role`) into `out`. No clamping.
pub(crate) fn mix_into(
    out: &mut [f32],
    schedule: &Schedule,
    t0: f64,
    sample_rate: u32,
    channels: u16,
    role: Option<SourceRole>,
) {
    if sample_rate == 0 || channels == 0 {
        return;
    }
    for src in schedule.sources() {
        if role.is_some_and(|r| r != src.role) {
            continue;
        }
        mix_source(out, src, t0, sample_rate, channels);
    }
}

fn mix_source(out: &mut [f32], src: &ScheduledSource, t0: f64, sample_rate: u32, channels: u16) {
    let buf = src.buffer.as_ref();
    let src_frames = buf.frames();
    if src_frames == 0 || buf.sample_rate == 0 {
        return;
    }
    let src_duration = buf.duration_secs();
    let ch = usize::from(channels);
    let frames = out.len() / ch;

    // Skip the silent lead-in before the source starts.
    let first = ((src.start_at - t0) * f64::from(sample_rate)).floor().max(0.0) as usize;
    for dst_frame in first..frames {
        let t = t0 + dst_frame as f64 / f64::from(sample_rate);
        let rel_sec = t - src.start_at;
        if rel_sec < 0.0 {
            continue;
        }

        let mut src_sec = src.offset + rel_sec * src.playback_rate;
        if src.looping {
            src_sec = wrap_positive(src_sec, src_duration);
        } else if src_sec >= src_duration {
            break;
        }

        let src_pos = src_sec * f64::from(buf.sample_rate);
        if !src_pos.is_finite() || src_pos < 0.0 {
            break;
        }
        let src_frame0 = src_pos.floor() as usize;
        if src_frame0 >= src_frames {
            break;
        }
        let src_frame1 = if src.looping {
            (src_frame0 + 1) % src_frames
        } else {
            (src_frame0 + 1).min(src_frames - 1)
        };
        let frac = (src_pos - src_frame0 as f64) as f32;

        let (l0, r0) = buf.stereo_frame(src_frame0);
        let (l1, r1) = buf.stereo_frame(src_frame1);
        let l = l0 + (l1 - l0) * frac;
        let r = r0 + (r1 - r0) * frac;

        let dst_idx = dst_frame * ch;
        if ch == 1 {
            out[dst_idx] += (l + r) * 0.5 * src.gain;
        } else {
            out[dst_idx] += l * src.gain;
            out[dst_idx + 1] += r * src.gain;
        }
    }
}

/// Write interleaved `f32` PCM samples to a raw little-endian `.f32le` file.
pub(crate) fn write_mix_to_f32le_file(samples_interleaved: &[f32], out_path: &Path) -> ReelResult<()> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ReelError::encode(format!(
                "failed to create audio output directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    let mut bytes = Vec::<u8>::with_capacity(samples_interleaved.len() * 4);
    for &sample in samples_interleaved {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    std::fs::write(out_path, bytes).map_err(|e| {
        ReelError::encode(format!(
            "failed to write captured audio '{}': {e}",
            out_path.display()
        ))
    })
}
