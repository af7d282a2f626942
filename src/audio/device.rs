use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::audio::context::{AudioContext, ContextFactory};
use crate::audio::graph::Schedule;
use crate::audio::mix;
use crate::foundation::error::{ReelError, ReelResult};

#[derive(Default)]
struct Shared {
    schedule: Mutex<Option<Arc<Schedule>>>,
    frames: AtomicU64,
}

/// Live output on the default device. The context clock counts frames the device pulled.
pub struct DeviceContext {
    stream: Option<cpal::Stream>,
    shared: Arc<Shared>,
    sample_rate: u32,
    closed: bool,
}

impl DeviceContext {
    pub fn open_default() -> ReelResult<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| ReelError::audio_blocked("no default audio output device"))?;
        let supported = device
            .default_output_config()
            .map_err(|e| ReelError::audio_blocked(format!("failed to query output config: {e}")))?;
        if supported.sample_format() != cpal::SampleFormat::F32 {
            return Err(ReelError::audio_graph(format!(
                "unsupported output sample format {:?}",
                supported.sample_format()
            )));
        }
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();
        let config: cpal::StreamConfig = supported.into();

        let shared = Arc::new(Shared::default());
        let cb_shared = Arc::clone(&shared);
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    fill_output(&cb_shared, data, sample_rate, channels);
                },
                |err| tracing::warn!("audio output stream error: {err}"),
                None,
            )
            .map_err(|e| ReelError::audio_blocked(format!("failed to open output stream: {e}")))?;
        tracing::debug!(sample_rate, channels, "audio output opened");

        Ok(Self {
            stream: Some(stream),
            shared,
            sample_rate,
            closed: false,
        })
    }
}

fn fill_output(shared: &Shared, data: &mut [f32], sample_rate: u32, channels: u16) {
    data.fill(0.0);
    let ch = usize::from(channels.max(1));
    let frames = data.len() / ch;
    let start = shared.frames.load(Ordering::Acquire);
    let t0 = start as f64 / f64::from(sample_rate);

    let schedule = shared.schedule.lock().ok().and_then(|g| g.clone());
    if let Some(schedule) = schedule {
        let mix_channels = channels.clamp(1, 2);
        let mixed = mix::render_schedule(&schedule, t0, frames, sample_rate, mix_channels);
        let mc = usize::from(mix_channels);
        for (frame, out) in data.chunks_exact_mut(ch).enumerate() {
            out[..mc].copy_from_slice(&mixed[frame * mc..frame * mc + mc]);
        }
    }
    shared.frames.fetch_add(frames as u64, Ordering::AcqRel);
}

impl AudioContext for DeviceContext {
    fn current_time(&self) -> f64 {
        self.shared.frames.load(Ordering::Acquire) as f64 / f64::from(self.sample_rate)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn resume(&mut self) -> ReelResult<()> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| ReelError::audio_graph("audio context is closed"))?;
        stream
            .play()
            .map_err(|e| ReelError::audio_blocked(format!("audio output refused to start: {e}")))
    }

    fn connect(&mut self, schedule: Arc<Schedule>) {
        if let Ok(mut guard) = self.shared.schedule.lock() {
            *guard = Some(schedule);
        }
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.pause();
        }
        if let Ok(mut guard) = self.shared.schedule.lock() {
            *guard = None;
        }
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeviceFactory;

impl ContextFactory for DeviceFactory {
    type Context = DeviceContext;

    fn create(&mut self) -> ReelResult<DeviceContext> {
        DeviceContext::open_default()
    }
}
