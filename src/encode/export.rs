use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::assets::media::MIX_SAMPLE_RATE;
use crate::assets::store::AssetCache;
use crate::audio::context::CaptureContext;
use crate::audio::graph::{GraphInputs, PlaybackSession};
use crate::encode::progress::{ExportProgress, ExportStage, ProgressTracker};
use crate::encode::sink::{ContainerFormat, FrameSink, SinkConfig};
use crate::foundation::core::{Canvas, Fps, FrameIndex};
use crate::foundation::error::{ReelError, ReelResult};
use crate::model::project::{AspectRatio, Project};
use crate::model::scene::SceneId;
use crate::render::backend::RasterBackend;
use crate::render::compositor::{Compositor, CompositorOpts, FrameContext};
use crate::timeline::{Timeline, build_timeline};

/// Export resolution class. Landscape sizes; portrait projects swap the axes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Resolution {
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "720p")]
    P720,
    #[default]
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "4k")]
    P4k,
}

impl Resolution {
    pub fn landscape_size(self) -> (u32, u32) {
        match self {
            Self::P360 => (640, 360),
            Self::P720 => (1280, 720),
            Self::P1080 => (1920, 1080),
            Self::P4k => (3840, 2160),
        }
    }

    pub fn canvas(self, aspect: AspectRatio) -> Canvas {
        let (w, h) = self.landscape_size();
        match aspect {
            AspectRatio::Landscape => Canvas {
                width: w,
                height: h,
            },
            AspectRatio::Portrait => Canvas {
                width: h,
                height: w,
            },
        }
    }
}

impl std::str::FromStr for Resolution {
    type Err = ReelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "360p" | "360" => Ok(Self::P360),
            "720p" | "720" => Ok(Self::P720),
            "1080p" | "1080" => Ok(Self::P1080),
            "4k" | "2160p" | "2160" => Ok(Self::P4k),
            other => Err(ReelError::validation(format!(
                "unknown resolution \"{other}\" (expected 360p, 720p, 1080p or 4k)"
            ))),
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::P360 => "360p",
            Self::P720 => "720p",
            Self::P1080 => "1080p",
            Self::P4k => "4k",
        })
    }
}

pub const DEFAULT_VIDEO_BITRATE: u32 = 15_000_000;
pub const DEFAULT_EXPORT_FPS: u32 = 60;
pub const DEFAULT_ASSET_WAIT: Duration = Duration::from_secs(2);

/// User-facing render settings.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderOptions {
    pub resolution: Resolution,
    /// Bits per second.
    pub bitrate: u32,
    pub fps: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            bitrate: DEFAULT_VIDEO_BITRATE,
            fps: DEFAULT_EXPORT_FPS,
        }
    }
}

impl RenderOptions {
    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = bitrate;
        self
    }
}

/// Run-level knobs that are not part of the deliverable's look.
#[derive(Clone, Debug)]
pub struct ExportOpts {
    /// Upper bound on wall-clock time for the whole run.
    pub max_wall_time: Option<Duration>,
    /// How long to wait for pending visuals before rendering without them.
    pub asset_wait: Duration,
    pub sample_rate: u32,
}

impl Default for ExportOpts {
    fn default() -> Self {
        Self {
            max_wall_time: None,
            asset_wait: DEFAULT_ASSET_WAIT,
            sample_rate: MIX_SAMPLE_RATE,
        }
    }
}

impl ExportOpts {
    pub fn with_max_wall_time(mut self, limit: Duration) -> Self {
        self.max_wall_time = Some(limit);
        self
    }

    pub fn with_asset_wait(mut self, wait: Duration) -> Self {
        self.asset_wait = wait;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExportOutput {
    pub path: PathBuf,
    pub container: ContainerFormat,
    pub extension: &'static str,
    /// Timeline length that was rendered.
    pub duration_secs: f64,
    pub frames: u64,
}

/// Fixed-rate capture of a whole project through the shared compositor.
#[derive(Clone, Debug, Default)]
pub struct Exporter {
    render: RenderOptions,
    opts: ExportOpts,
}

impl Exporter {
    pub fn new(render: RenderOptions, opts: ExportOpts) -> Self {
        Self { render, opts }
    }

    pub fn render_options(&self) -> &RenderOptions {
        &self.render
    }

    pub fn opts(&self) -> &ExportOpts {
        &self.opts
    }

    /// Render every frame of `project` into `sink`, then hand it the captured mix.
    ///
    /// The compositor is switched to the export resolution and the project's orientation for
    /// the run and restored afterwards, whether the run succeeds or not.
    #[tracing::instrument(
        level = "info",
        skip_all,
        fields(resolution = %self.render.resolution, fps = self.render.fps)
    )]
    pub fn run<B, S>(
        &self,
        project: &Project,
        cache: &mut AssetCache,
        compositor: &mut Compositor<B>,
        sink: &mut S,
        cancel: &AtomicBool,
        mut on_progress: impl FnMut(&ExportProgress),
    ) -> ReelResult<ExportOutput>
    where
        B: RasterBackend,
        S: FrameSink + ?Sized,
    {
        let fps = Fps::integer(self.render.fps)?;
        on_progress(&ProgressTracker::new(0).report(0, ExportStage::Preparing));

        cache.prepare(&project.scenes);
        if let Some(bgm) = &project.bgm {
            cache.ensure_bgm(&bgm.path);
        }
        if project.watermark_required {
            if let Some(path) = &project.watermark_path {
                cache.ensure_watermark(path);
            }
        }
        let ids: Vec<SceneId> = project.scenes.iter().map(|s| s.id).collect();
        if !cache.wait_for_visuals(&ids, self.opts.asset_wait) {
            tracing::warn!(
                wait_ms = self.opts.asset_wait.as_millis() as u64,
                "visuals still loading, exporting without them"
            );
        }

        let timeline = build_timeline(&project.scenes, &cache.view(), project.voice_speed)?;
        if timeline.is_empty() {
            return Err(ReelError::validation("no completed scenes to export"));
        }

        let interactive = *compositor.opts();
        compositor.set_opts(CompositorOpts {
            canvas: self.render.resolution.canvas(project.aspect),
            base_width: project.aspect.base_canvas().width,
            ..interactive
        });
        let result = self.capture(
            project,
            cache,
            compositor,
            sink,
            cancel,
            fps,
            &timeline,
            &mut on_progress,
        );
        compositor.set_opts(interactive);
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn capture<B, S>(
        &self,
        project: &Project,
        cache: &AssetCache,
        compositor: &mut Compositor<B>,
        sink: &mut S,
        cancel: &AtomicBool,
        fps: Fps,
        timeline: &Timeline,
        on_progress: &mut impl FnMut(&ExportProgress),
    ) -> ReelResult<ExportOutput>
    where
        B: RasterBackend,
        S: FrameSink + ?Sized,
    {
        let canvas = compositor.canvas();
        sink.begin(&SinkConfig {
            width: canvas.width,
            height: canvas.height,
            fps: self.render.fps,
            video_bitrate: self.render.bitrate,
            audio_sample_rate: self.opts.sample_rate,
            audio_channels: CaptureContext::CHANNELS,
        })?;

        let result = self.encode_frames(
            project,
            cache,
            compositor,
            sink,
            cancel,
            fps,
            timeline,
            on_progress,
        );
        if let Err(e) = &result {
            tracing::warn!(error = %e, "export failed, discarding partial output");
            sink.abort();
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn encode_frames<B, S>(
        &self,
        project: &Project,
        cache: &AssetCache,
        compositor: &mut Compositor<B>,
        sink: &mut S,
        cancel: &AtomicBool,
        fps: Fps,
        timeline: &Timeline,
        on_progress: &mut impl FnMut(&ExportProgress),
    ) -> ReelResult<ExportOutput>
    where
        B: RasterBackend,
        S: FrameSink + ?Sized,
    {
        let view = cache.view();
        let bgm_volume = project.bgm.as_ref().map_or(0.0, |b| b.volume);
        let inputs = GraphInputs::collect(
            timeline,
            &project.scenes,
            &view,
            project.voice_speed,
            bgm_volume,
        );
        let mut session =
            PlaybackSession::build(CaptureContext::new(self.opts.sample_rate), &inputs, 0.0)?;
        let frame_ctx = FrameContext::for_project(project, timeline, view);

        let total = timeline.total();
        let total_frames = fps.secs_to_frames_ceil(total);
        let tracker = ProgressTracker::new(total_frames);
        let started = Instant::now();
        tracing::info!(total_secs = total, total_frames, "export started");

        let mut frame = FrameIndex(0);
        loop {
            let elapsed = session.elapsed();
            if elapsed >= total || frame.0 >= total_frames {
                break;
            }
            if cancel.load(Ordering::Relaxed) {
                tracing::info!(frame = frame.0, "export cancelled");
                return Err(ReelError::Cancelled);
            }
            if let Some(limit) = self.opts.max_wall_time {
                let spent = started.elapsed();
                if spent >= limit {
                    return Err(ReelError::EncodeTimeout {
                        elapsed_secs: spent.as_secs_f64(),
                        frames_done: frame.0,
                        frames_total: total_frames,
                    });
                }
            }

            let input = frame_ctx.at(elapsed, session.amplitude(), true);
            let outcome = compositor.render_frame(&input)?;
            sink.push_frame(&outcome.frame)?;
            frame.0 += 1;
            on_progress(&tracker.report(frame.0, ExportStage::Rendering));

            session.context_mut().advance_to(fps.frames_to_secs(frame.0));
            if session.elapsed() <= elapsed {
                return Err(ReelError::EncodeStall { at_secs: elapsed });
            }
        }

        let audio = session.finish().take_captured();
        on_progress(&tracker.report(frame.0, ExportStage::Muxing));
        let out = sink.finish(&audio)?;
        on_progress(&tracker.report(frame.0, ExportStage::Done));
        tracing::info!(
            frames = frame.0,
            wall_secs = started.elapsed().as_secs_f64(),
            path = %out.path.display(),
            "export finished"
        );

        Ok(ExportOutput {
            path: out.path,
            container: out.container,
            extension: out.container.extension(),
            duration_secs: total,
            frames: frame.0,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/export.rs"]
mod tests;
