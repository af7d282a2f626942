//! storyreel turns an ordered list of narrated scenes into one continuous timeline and plays it
//! back or exports it.
//!
//! - Load a [`Project`] and warm an [`AssetCache`]
//! - Derive the [`Timeline`] from narration durations
//! - Drive it interactively with a [`PlaybackController`], or capture it at a fixed rate with an
//!   [`Exporter`] into a [`FrameSink`]
//!
//! Both paths draw through the same [`Compositor::render_frame`], so preview and export frames at
//! the same clock position are identical.
#![forbid(unsafe_code)]

mod foundation;

pub mod animation;
pub mod assets;
pub mod audio;
pub mod encode;
pub mod model;
pub mod playback;
pub mod render;
pub mod timeline;

pub use crate::foundation::core::{Affine, Canvas, Fps, FrameIndex, Point, Rect, Rgba8Premul, Vec2};
pub use crate::foundation::error::{ReelError, ReelResult};

pub use crate::assets::decode::PcmFormat;
pub use crate::assets::media::AudioPcm;
pub use crate::assets::store::{AssetCache, AssetView};
pub use crate::audio::context::{AudioContext, CaptureContext, ContextFactory, SystemFactory};
pub use crate::audio::graph::{GraphInputs, PlaybackSession};
pub use crate::encode::export::{ExportOpts, ExportOutput, Exporter, RenderOptions, Resolution};
pub use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts};
pub use crate::encode::progress::{ExportProgress, ExportStage, format_duration, format_time};
pub use crate::encode::sink::{ContainerFormat, FrameSink, InMemorySink, SinkConfig, SinkOutput};
pub use crate::model::project::{AspectRatio, BgmConfig, Project};
pub use crate::model::scene::{NarrationAudio, Scene, SceneId, SceneStatus, VisualRef};
pub use crate::model::style::SubtitleStyle;
pub use crate::playback::{
    PlaybackClock, PlaybackController, PlaybackState, PlayerEvent, PlayerEvents,
};
pub use crate::render::backend::{FrameRGBA, RasterBackend};
pub use crate::render::compositor::{
    Compositor, CompositorOpts, FrameContext, FrameInput, FrameOutcome,
};
pub use crate::render::cpu::{CpuBackend, CpuBackendOpts};
pub use crate::timeline::{Timeline, TimelineSpan, build_timeline};
