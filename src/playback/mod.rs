//! Interactive transport: play, pause, seek and the per-tick frame.

use smallvec::SmallVec;

use crate::audio::context::{AudioContext, ContextFactory};
use crate::audio::graph::{GraphInputs, PlaybackSession};
use crate::foundation::error::ReelResult;
use crate::render::backend::RasterBackend;
use crate::render::compositor::{Compositor, FrameContext, FrameOutcome};

/// Smallest clock movement reported as a [`PlayerEvent::TimeUpdate`].
pub const TIME_UPDATE_EPSILON: f64 = 0.05;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlayerEvent {
    PlaybackChanged(PlaybackState),
    TimeUpdate(f64),
}

pub type PlayerEvents = SmallVec<[PlayerEvent; 4]>;

/// Where the master clock stands: anchored to a context's time, or parked at an offset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlaybackClock {
    /// Master position is `context.current_time() - master_start`.
    Running { master_start: f64 },
    Paused { offset: f64 },
}

enum Transport<C: AudioContext> {
    Stopped { paused_at: f64 },
    Playing { session: PlaybackSession<C> },
}

/// Owns the transport state machine. Every play builds a fresh session on a fresh context;
/// pause, stop and seek tear it down.
pub struct PlaybackController<F: ContextFactory> {
    factory: F,
    inputs: GraphInputs,
    transport: Transport<F::Context>,
    last_reported: Option<f64>,
    events: PlayerEvents,
}

impl<F: ContextFactory> PlaybackController<F> {
    pub fn new(factory: F, inputs: GraphInputs) -> Self {
        Self {
            factory,
            inputs,
            transport: Transport::Stopped { paused_at: 0.0 },
            last_reported: None,
            events: SmallVec::new(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        match self.transport {
            Transport::Stopped { .. } => PlaybackState::Stopped,
            Transport::Playing { .. } => PlaybackState::Playing,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    pub fn total(&self) -> f64 {
        self.inputs.total
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn clock(&self) -> PlaybackClock {
        match &self.transport {
            Transport::Stopped { paused_at } => PlaybackClock::Paused { offset: *paused_at },
            Transport::Playing { session } => PlaybackClock::Running {
                master_start: session.master_start(),
            },
        }
    }

    /// Current master position, clamped to the timeline.
    pub fn elapsed(&self) -> f64 {
        let t = match &self.transport {
            Transport::Stopped { paused_at } => *paused_at,
            Transport::Playing { session } => session.elapsed(),
        };
        t.clamp(0.0, self.total().max(0.0))
    }

    /// Replace the graph inputs after the timeline changed. A running session is rebuilt at
    /// the current position.
    pub fn set_inputs(&mut self, inputs: GraphInputs) -> ReelResult<()> {
        let playing = self.is_playing();
        let at = self.halt();
        self.inputs = inputs;
        self.transport = Transport::Stopped {
            paused_at: at.clamp(0.0, self.total().max(0.0)),
        };
        if playing {
            self.start()
        } else {
            Ok(())
        }
    }

    pub fn play(&mut self) -> ReelResult<()> {
        let at = self.halt();
        self.transport = Transport::Stopped { paused_at: at };
        self.start()
    }

    pub fn pause(&mut self) {
        if !self.is_playing() {
            return;
        }
        let at = self.halt().clamp(0.0, self.total().max(0.0));
        self.transport = Transport::Stopped { paused_at: at };
        tracing::debug!(at, "playback paused");
        self.events
            .push(PlayerEvent::PlaybackChanged(PlaybackState::Stopped));
    }

    /// Same as [`pause`](Self::pause): the position is kept for the next play.
    pub fn stop(&mut self) {
        self.pause();
    }

    pub fn toggle(&mut self) -> ReelResult<()> {
        if self.is_playing() {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    /// Move to `t`, clamped to the timeline. A running session restarts there.
    pub fn seek(&mut self, t: f64) -> ReelResult<()> {
        let t = if t.is_finite() {
            t.clamp(0.0, self.total().max(0.0))
        } else {
            0.0
        };
        let was_playing = self.is_playing();
        self.pause();
        self.transport = Transport::Stopped { paused_at: t };
        self.report_time(t, true);
        if was_playing {
            self.start()
        } else {
            Ok(())
        }
    }

    /// Seek, then play whether or not playback was running.
    pub fn seek_and_play(&mut self, t: f64) -> ReelResult<()> {
        self.seek(t)?;
        if self.is_playing() {
            Ok(())
        } else {
            self.start()
        }
    }

    /// Render the frame for the current clock and stop at the end of the timeline.
    pub fn tick<B: RasterBackend>(
        &mut self,
        compositor: &mut Compositor<B>,
        frame: &FrameContext<'_>,
    ) -> ReelResult<FrameOutcome> {
        let total = self.total().max(0.0);
        let (elapsed, amplitude, animating) = match &self.transport {
            Transport::Playing { session } => (session.elapsed(), session.amplitude(), true),
            Transport::Stopped { paused_at } => (*paused_at, 0.0, false),
        };
        let at_end = animating && elapsed >= total;
        let shown = elapsed.clamp(0.0, total);

        let outcome = compositor.render_frame(&frame.at(shown, amplitude, animating))?;

        if at_end {
            self.halt();
            self.transport = Transport::Stopped { paused_at: total };
            tracing::debug!(total, "playback reached the end");
            self.events
                .push(PlayerEvent::PlaybackChanged(PlaybackState::Stopped));
        }
        self.report_time(shown, at_end);
        Ok(outcome)
    }

    pub fn drain_events(&mut self) -> PlayerEvents {
        std::mem::take(&mut self.events)
    }

    /// Build a session at the paused offset and enter `Playing`. Failures, including a blocked
    /// audio context, leave the controller stopped.
    fn start(&mut self) -> ReelResult<()> {
        let total = self.total().max(0.0);
        let paused_at = match self.transport {
            Transport::Stopped { paused_at } => paused_at,
            Transport::Playing { .. } => return Ok(()),
        };
        let offset = if paused_at >= total { 0.0 } else { paused_at.max(0.0) };

        let session = self
            .factory
            .create()
            .and_then(|ctx| PlaybackSession::build(ctx, &self.inputs, offset));
        match session {
            Ok(session) => {
                tracing::debug!(offset, total, "playback started");
                self.transport = Transport::Playing { session };
                self.events
                    .push(PlayerEvent::PlaybackChanged(PlaybackState::Playing));
                Ok(())
            }
            Err(e) => {
                tracing::warn!("playback could not start: {e}");
                Err(e)
            }
        }
    }

    /// Tear down any running session and return the position it reached.
    fn halt(&mut self) -> f64 {
        match std::mem::replace(&mut self.transport, Transport::Stopped { paused_at: 0.0 }) {
            Transport::Stopped { paused_at } => paused_at,
            Transport::Playing { session } => session.stop(),
        }
    }

    fn report_time(&mut self, t: f64, force: bool) {
        let moved = self
            .last_reported
            .is_none_or(|last| (t - last).abs() > TIME_UPDATE_EPSILON);
        if moved || (force && self.last_reported != Some(t)) {
            self.last_reported = Some(t);
            self.events.push(PlayerEvent::TimeUpdate(t));
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/playback/controller.rs"]
mod tests;
