use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use crate::assets::media::{AudioPcm, MIX_SAMPLE_RATE};
use crate::audio::graph::Schedule;
use crate::audio::mix;
use crate::foundation::error::{ReelError, ReelResult};

/// Clock and output of one playback run.
///
/// Contexts are single-use: once closed they are never resumed again; the controller asks its
/// [`ContextFactory`] for a fresh one.
pub trait AudioContext {
    /// Monotonic context time in seconds.
    fn current_time(&self) -> f64;
    fn sample_rate(&self) -> u32;
    /// Activate output. Fails with `AudioContextBlocked` when the platform refuses.
    fn resume(&mut self) -> ReelResult<()>;
    /// Route a render schedule to the destination, replacing any previous one.
    fn connect(&mut self, schedule: Arc<Schedule>);
    fn close(&mut self);
    fn is_closed(&self) -> bool;
}

impl<C: AudioContext + ?Sized> AudioContext for Box<C> {
    fn current_time(&self) -> f64 {
        (**self).current_time()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn resume(&mut self) -> ReelResult<()> {
        (**self).resume()
    }

    fn connect(&mut self, schedule: Arc<Schedule>) {
        (**self).connect(schedule)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}

/// Source of fresh contexts for the playback controller.
pub trait ContextFactory {
    type Context: AudioContext;

    fn create(&mut self) -> ReelResult<Self::Context>;
}

fn closed_error() -> ReelError {
    ReelError::audio_graph("audio context is closed")
}

/// Offline context for export: time only moves when the caller advances it, and every
/// advance renders the schedule into an in-memory stereo buffer.
pub struct CaptureContext {
    sample_rate: u32,
    clock: f64,
    rendered_frames: u64,
    schedule: Option<Arc<Schedule>>,
    captured: Vec<f32>,
    closed: bool,
}

impl CaptureContext {
    pub const CHANNELS: u16 = 2;

    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            clock: 0.0,
            rendered_frames: 0,
            schedule: None,
            captured: Vec::new(),
            closed: false,
        }
    }

    /// Move the clock forward by `secs` and render the audio in between.
    pub fn advance_by(&mut self, secs: f64) {
        if secs.is_finite() && secs > 0.0 {
            self.advance_to(self.clock + secs);
        }
    }

    /// Move the clock to `t` (never backwards) and render the audio in between.
    pub fn advance_to(&mut self, t: f64) {
        if self.closed || !t.is_finite() || t <= self.clock {
            return;
        }
        self.clock = t;
        let target = (t * f64::from(self.sample_rate)).round() as u64;
        let frames = target.saturating_sub(self.rendered_frames) as usize;
        if frames == 0 {
            return;
        }
        let t0 = self.rendered_frames as f64 / f64::from(self.sample_rate);
        match &self.schedule {
            Some(schedule) => self.captured.extend(mix::render_schedule(
                schedule,
                t0,
                frames,
                self.sample_rate,
                Self::CHANNELS,
            )),
            None => self
                .captured
                .resize(self.captured.len() + frames * usize::from(Self::CHANNELS), 0.0),
        }
        self.rendered_frames = target;
    }

    pub fn captured_frames(&self) -> u64 {
        self.rendered_frames
    }

    /// Hand over everything captured so far.
    pub fn take_captured(&mut self) -> AudioPcm {
        AudioPcm {
            sample_rate: self.sample_rate,
            channels: Self::CHANNELS,
            interleaved_f32: std::mem::take(&mut self.captured),
        }
    }
}

impl Default for CaptureContext {
    fn default() -> Self {
        Self::new(MIX_SAMPLE_RATE)
    }
}

impl AudioContext for CaptureContext {
    fn current_time(&self) -> f64 {
        self.clock
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn resume(&mut self) -> ReelResult<()> {
        if self.closed {
            return Err(closed_error());
        }
        Ok(())
    }

    fn connect(&mut self, schedule: Arc<Schedule>) {
        self.schedule = Some(schedule);
    }

    fn close(&mut self) {
        self.closed = true;
        self.schedule = None;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Shared, externally driven clock.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(t: f64) -> Self {
        let clock = Self::default();
        clock.set(t);
        clock
    }

    pub fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    pub fn set(&self, t: f64) {
        self.bits.store(t.to_bits(), Ordering::Release);
    }

    pub fn advance(&self, dt: f64) {
        self.set(self.now() + dt);
    }
}

/// Silent context on a [`ManualClock`], for deterministic tests and headless tools.
pub struct ManualContext {
    clock: ManualClock,
    sample_rate: u32,
    blocked: bool,
    closed: bool,
    schedule: Option<Arc<Schedule>>,
}

impl ManualContext {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            sample_rate: MIX_SAMPLE_RATE,
            blocked: false,
            closed: false,
            schedule: None,
        }
    }

    /// Refuse activation like a browser without a user gesture.
    pub fn blocked(mut self) -> Self {
        self.blocked = true;
        self
    }

    pub fn schedule(&self) -> Option<&Arc<Schedule>> {
        self.schedule.as_ref()
    }
}

impl AudioContext for ManualContext {
    fn current_time(&self) -> f64 {
        self.clock.now()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn resume(&mut self) -> ReelResult<()> {
        if self.closed {
            return Err(closed_error());
        }
        if self.blocked {
            return Err(ReelError::audio_blocked("audio output requires a user gesture"));
        }
        Ok(())
    }

    fn connect(&mut self, schedule: Arc<Schedule>) {
        self.schedule = Some(schedule);
    }

    fn close(&mut self) {
        self.closed = true;
        self.schedule = None;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Creates [`ManualContext`]s sharing one clock.
#[derive(Clone, Debug, Default)]
pub struct ManualFactory {
    clock: ManualClock,
    blocked: Arc<AtomicBool>,
    created: Arc<AtomicU64>,
}

impl ManualFactory {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            ..Self::default()
        }
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::Release);
    }

    /// Number of contexts handed out so far.
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Acquire)
    }
}

impl ContextFactory for ManualFactory {
    type Context = ManualContext;

    fn create(&mut self) -> ReelResult<ManualContext> {
        self.created.fetch_add(1, Ordering::AcqRel);
        let ctx = ManualContext::new(self.clock.clone());
        Ok(if self.blocked.load(Ordering::Acquire) {
            ctx.blocked()
        } else {
            ctx
        })
    }
}

/// Wall-clock context without an output device.
pub struct SystemContext {
    origin: Instant,
    sample_rate: u32,
    closed: bool,
}

impl SystemContext {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            sample_rate: MIX_SAMPLE_RATE,
            closed: false,
        }
    }
}

impl Default for SystemContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioContext for SystemContext {
    fn current_time(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn resume(&mut self) -> ReelResult<()> {
        if self.closed {
            return Err(closed_error());
        }
        Ok(())
    }

    // Nothing is heard; sessions still meter their own schedule.
    fn connect(&mut self, _schedule: Arc<Schedule>) {}

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemFactory;

impl ContextFactory for SystemFactory {
    type Context = SystemContext;

    fn create(&mut self) -> ReelResult<SystemContext> {
        Ok(SystemContext::new())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/audio/context.rs"]
mod tests;
