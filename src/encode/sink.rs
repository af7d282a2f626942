use std::path::PathBuf;

use crate::assets::media::AudioPcm;
use crate::foundation::error::{ReelError, ReelResult};
use crate::render::backend::FrameRGBA;

/// Output container with its codec pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainerFormat {
    Mp4H264Aac,
    WebmVp9Opus,
    WebmVp8Vorbis,
}

impl ContainerFormat {
    /// Negotiation order, most compatible first.
    pub const PREFERENCE: [ContainerFormat; 3] =
        [Self::Mp4H264Aac, Self::WebmVp9Opus, Self::WebmVp8Vorbis];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4H264Aac => "mp4",
            Self::WebmVp9Opus | Self::WebmVp8Vorbis => "webm",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Mp4H264Aac => "video/mp4;codecs=avc1,mp4a",
            Self::WebmVp9Opus => "video/webm;codecs=vp9,opus",
            Self::WebmVp8Vorbis => "video/webm;codecs=vp8,vorbis",
        }
    }
}

impl std::fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Stream parameters announced to a sink before the first frame.
#[derive(Clone, Debug, PartialEq)]
pub struct SinkConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Target video bitrate in bits per second.
    pub video_bitrate: u32,
    pub audio_sample_rate: u32,
    pub audio_channels: u16,
}

impl SinkConfig {
    pub fn validate(&self) -> ReelResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ReelError::validation("encode width/height must be non-zero"));
        }
        if self.fps == 0 {
            return Err(ReelError::validation("encode fps must be non-zero"));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            return Err(ReelError::validation(
                "encode width/height must be even (required for yuv420p output)",
            ));
        }
        if self.audio_sample_rate == 0 || self.audio_channels == 0 {
            return Err(ReelError::validation(
                "audio sample rate and channel count must be non-zero",
            ));
        }
        Ok(())
    }

    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// What a finished sink produced.
#[derive(Clone, Debug, PartialEq)]
pub struct SinkOutput {
    /// Written file; empty for sinks that keep everything in memory.
    pub path: PathBuf,
    pub container: ContainerFormat,
}

/// Destination of an export: frames in order, then the captured audio once at the end.
pub trait FrameSink {
    /// Negotiate and open the output. Fails with `EncoderInit` before any frame is rendered.
    fn begin(&mut self, config: &SinkConfig) -> ReelResult<()>;

    fn push_frame(&mut self, frame: &FrameRGBA) -> ReelResult<()>;

    fn finish(&mut self, audio: &AudioPcm) -> ReelResult<SinkOutput>;

    /// Tear down a run that will not reach `finish`. Safe to call when nothing is open.
    fn abort(&mut self) {}
}

/// Keeps frames and audio in memory.
#[derive(Debug, Default)]
pub struct InMemorySink {
    config: Option<SinkConfig>,
    keep_frames: bool,
    frame_count: u64,
    frames: Vec<FrameRGBA>,
    audio: Option<AudioPcm>,
    aborted: bool,
}

impl InMemorySink {
    /// Sink that counts frames without storing them.
    pub fn counting() -> Self {
        Self::default()
    }

    pub fn keeping_frames() -> Self {
        Self {
            keep_frames: true,
            ..Self::default()
        }
    }

    pub fn config(&self) -> Option<&SinkConfig> {
        self.config.as_ref()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn frames(&self) -> &[FrameRGBA] {
        &self.frames
    }

    pub fn audio(&self) -> Option<&AudioPcm> {
        self.audio.as_ref()
    }

    /// The last run was torn down before `finish`.
    pub fn aborted(&self) -> bool {
        self.aborted
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, config: &SinkConfig) -> ReelResult<()> {
        config.validate()?;
        self.config = Some(config.clone());
        self.frame_count = 0;
        self.frames.clear();
        self.audio = None;
        self.aborted = false;
        Ok(())
    }

    fn push_frame(&mut self, frame: &FrameRGBA) -> ReelResult<()> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| ReelError::encode("sink received a frame before begin"))?;
        if frame.width != config.width || frame.height != config.height {
            return Err(ReelError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, config.width, config.height
            )));
        }
        self.frame_count += 1;
        if self.keep_frames {
            self.frames.push(frame.clone());
        }
        Ok(())
    }

    fn finish(&mut self, audio: &AudioPcm) -> ReelResult<SinkOutput> {
        self.audio = Some(audio.clone());
        Ok(SinkOutput {
            path: PathBuf::new(),
            container: ContainerFormat::Mp4H264Aac,
        })
    }

    fn abort(&mut self) {
        self.aborted = true;
    }
}
