//! Playback sessions: the set of audio sources scheduled for one transport run.
//!
//! A session is built fresh for every play/seek/export and torn down on stop; sources are
//! single-use, so nothing from an old session can leak into a new one.

use std::sync::Arc;

use crate::assets::media::AudioPcm;
use crate::assets::store::AssetView;
use crate::audio::context::AudioContext;
use crate::audio::mix;
use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::math::wrap_positive;
use crate::model::scene::Scene;
use crate::timeline::{Timeline, TimelineSpan};

/// Samples inspected by the level analyser.
pub const ANALYSER_WINDOW: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceRole {
    /// Feeds the analyser and the output.
    Narration,
    /// Background music; bypasses the analyser.
    Music,
}

/// A source as it sits in the context's render schedule.
#[derive(Clone, Debug)]
pub struct ScheduledSource {
    pub buffer: Arc<AudioPcm>,
    pub role: SourceRole,
    /// Context time at which the source becomes audible.
    pub start_at: f64,
    /// Seconds into the buffer at `start_at`.
    pub offset: f64,
    pub playback_rate: f64,
    pub looping: bool,
    pub gain: f32,
}

/// Immutable render schedule shared with the audio thread.
#[derive(Clone, Debug, Default)]
pub struct Schedule {
    sources: Vec<ScheduledSource>,
}

impl Schedule {
    pub fn from_sources(sources: Vec<ScheduledSource>) -> Self {
        Self { sources }
    }

    pub fn sources(&self) -> &[ScheduledSource] {
        &self.sources
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// One-shot player over a decoded buffer.
#[derive(Debug)]
pub struct BufferSource {
    buffer: Arc<AudioPcm>,
    role: SourceRole,
    playback_rate: f64,
    looping: bool,
    gain: f32,
    started: Option<(f64, f64)>,
    stopped: bool,
}

impl BufferSource {
    pub fn new(buffer: Arc<AudioPcm>, role: SourceRole) -> Self {
        Self {
            buffer,
            role,
            playback_rate: 1.0,
            looping: false,
            gain: 1.0,
            started: None,
            stopped: false,
        }
    }

    pub fn with_playback_rate(mut self, rate: f64) -> Self {
        self.playback_rate = rate;
        self
    }

    pub fn with_loop(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain = gain;
        self
    }

    /// Schedule playback at context time `at`, `offset` seconds into the buffer.
    pub fn start(&mut self, at: f64, offset: f64) -> ReelResult<()> {
        if self.started.is_some() || self.stopped {
            return Err(ReelError::audio_graph("buffer source can only be started once"));
        }
        if !at.is_finite() || !offset.is_finite() || offset < 0.0 {
            return Err(ReelError::audio_graph(format!(
                "invalid source start (at {at}, offset {offset})"
            )));
        }
        self.started = Some((at, offset));
        Ok(())
    }

    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn is_started(&self) -> bool {
        self.started.is_some()
    }

    fn scheduled(&self) -> Option<ScheduledSource> {
        let (start_at, offset) = self.started?;
        (!self.stopped).then(|| ScheduledSource {
            buffer: Arc::clone(&self.buffer),
            role: self.role,
            start_at,
            offset,
            playback_rate: self.playback_rate,
            looping: self.looping,
            gain: self.gain,
        })
    }
}

/// Level meter over the narration sources.
#[derive(Clone, Copy, Debug)]
pub struct Analyser {
    window: usize,
}

impl Default for Analyser {
    fn default() -> Self {
        Self {
            window: ANALYSER_WINDOW,
        }
    }
}

impl Analyser {
    /// Mean absolute narration level over the window ending at context time `t`, in `[0, 1]`.
    pub fn level(&self, schedule: &Schedule, t: f64, sample_rate: u32) -> f32 {
        if schedule.is_empty() || sample_rate == 0 || self.window == 0 {
            return 0.0;
        }
        let mut buf = vec![0.0f32; self.window];
        let t0 = t - self.window as f64 / f64::from(sample_rate);
        mix::mix_into(
            &mut buf,
            schedule,
            t0,
            sample_rate,
            1,
            Some(SourceRole::Narration),
        );
        let sum: f32 = buf.iter().map(|s| s.abs()).sum();
        (sum / self.window as f32).clamp(0.0, 1.0)
    }
}

/// Narration buffer bound to its timeline span.
#[derive(Clone, Debug)]
pub struct NarrationSlot {
    pub span: TimelineSpan,
    pub buffer: Arc<AudioPcm>,
}

#[derive(Clone, Debug)]
pub struct BgmInput {
    pub buffer: Arc<AudioPcm>,
    /// Linear gain in `[0, 1]`.
    pub volume: f32,
}

/// Everything a session needs, resolved from the timeline and the asset cache.
#[derive(Clone, Debug, Default)]
pub struct GraphInputs {
    pub total: f64,
    pub speed: f64,
    pub narration: Vec<NarrationSlot>,
    pub bgm: Option<BgmInput>,
}

impl GraphInputs {
    pub fn collect(
        timeline: &Timeline,
        scenes: &[Scene],
        assets: &AssetView<'_>,
        speed: f64,
        bgm_volume: f32,
    ) -> Self {
        let narration = timeline
            .spans()
            .iter()
            .filter_map(|span| {
                let scene = scenes.iter().find(|s| s.id == span.scene)?;
                let buffer = assets.narration(scene)?;
                Some(NarrationSlot {
                    span: *span,
                    buffer,
                })
            })
            .collect();
        Self {
            total: timeline.total(),
            speed,
            narration,
            bgm: assets.bgm().map(|buffer| BgmInput {
                buffer,
                volume: bgm_volume.clamp(0.0, 1.0),
            }),
        }
    }
}

/// Sources scheduled on one context for one transport run.
pub struct PlaybackSession<C: AudioContext> {
    ctx: C,
    master_start: f64,
    total: f64,
    sources: Vec<BufferSource>,
    schedule: Arc<Schedule>,
    analyser: Analyser,
}

impl<C: AudioContext> PlaybackSession<C> {
    /// Activate `ctx` and schedule every source so that master time `start_offset` is heard now.
    #[tracing::instrument(level = "debug", skip(ctx, inputs), fields(sources = inputs.narration.len()))]
    pub fn build(mut ctx: C, inputs: &GraphInputs, start_offset: f64) -> ReelResult<Self> {
        if !inputs.speed.is_finite() || inputs.speed <= 0.0 {
            return Err(ReelError::validation(format!(
                "narration speed must be finite and > 0, got {}",
                inputs.speed
            )));
        }
        ctx.resume()?;

        let start_offset = if start_offset.is_finite() {
            start_offset.max(0.0)
        } else {
            0.0
        };
        let now = ctx.current_time();
        let master_start = now - start_offset;

        let mut sources = Vec::with_capacity(inputs.narration.len() + 1);
        for slot in &inputs.narration {
            if slot.span.end <= start_offset {
                continue;
            }
            let mut src = BufferSource::new(Arc::clone(&slot.buffer), SourceRole::Narration)
                .with_playback_rate(inputs.speed);
            let (at, offset) = if slot.span.start < start_offset {
                (now, (start_offset - slot.span.start) * inputs.speed)
            } else {
                (now + (slot.span.start - start_offset), 0.0)
            };
            src.start(at, offset)?;
            sources.push(src);
        }

        if let Some(bgm) = &inputs.bgm {
            let mut src = BufferSource::new(Arc::clone(&bgm.buffer), SourceRole::Music)
                .with_loop(true)
                .with_gain(bgm.volume);
            src.start(now, wrap_positive(start_offset, bgm.buffer.duration_secs()))?;
            sources.push(src);
        }

        let schedule = Arc::new(Schedule::from_sources(
            sources.iter().filter_map(BufferSource::scheduled).collect(),
        ));
        ctx.connect(Arc::clone(&schedule));
        tracing::debug!(
            start_offset,
            scheduled = schedule.sources().len(),
            total = inputs.total,
            "playback session built"
        );

        Ok(Self {
            ctx,
            master_start,
            total: inputs.total,
            sources,
            schedule,
            analyser: Analyser::default(),
        })
    }

    /// Master-clock position.
    pub fn elapsed(&self) -> f64 {
        self.ctx.current_time() - self.master_start
    }

    pub fn master_start(&self) -> f64 {
        self.master_start
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    /// Current narration level for the beat pulse.
    pub fn amplitude(&self) -> f32 {
        self.analyser
            .level(&self.schedule, self.ctx.current_time(), self.ctx.sample_rate())
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn context(&self) -> &C {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.ctx
    }

    /// Stop every source and close the context; returns the master position reached.
    pub fn stop(mut self) -> f64 {
        let elapsed = self.elapsed();
        for src in &mut self.sources {
            src.stop();
        }
        self.ctx.close();
        elapsed
    }

    /// Like [`stop`](Self::stop) but hands the closed context back, e.g. to collect captured
    /// audio.
    pub fn finish(mut self) -> C {
        for src in &mut self.sources {
            src.stop();
        }
        self.ctx.close();
        self.ctx
    }
}

#[cfg(test)]
#[path = "../../tests/unit/audio/graph.rs"]
mod tests;
