//! Frame composition. One [`Compositor::render_frame`] serves preview and export alike.

use crate::animation::ease::Ease;
use crate::animation::kenburns::{IMAGE_MAX_ZOOM, VIDEO_MAX_ZOOM, cover_rect, zoom_at};
use crate::animation::subtitle::{SubtitleLayer, SubtitleParams, plan_subtitles};
use crate::assets::store::{AssetView, VisualAsset};
use crate::assets::text::TextMeasure;
use crate::foundation::core::{Canvas, Rect, Rgba8Premul};
use crate::foundation::error::ReelResult;
use crate::foundation::math::wrap_positive;
use crate::model::project::{AspectRatio, Project};
use crate::model::scene::{Scene, SceneId};
use crate::model::style::SubtitleStyle;
use crate::render::backend::{FrameRGBA, RasterBackend};
use crate::render::cpu::CpuBackend;
use crate::timeline::Timeline;

/// `#050505`
pub const BACKGROUND: Rgba8Premul = Rgba8Premul {
    r: 5,
    g: 5,
    b: 5,
    a: 255,
};
pub const WATERMARK_WIDTH_FRACTION: f64 = 0.15;
pub const WATERMARK_PADDING_PX: f64 = 40.0;
pub const WATERMARK_OPACITY: f32 = 0.8;
/// Canvas width the subtitle font sizes are authored for.
pub const DEFAULT_BASE_WIDTH: u32 = 1920;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompositorOpts {
    pub canvas: Canvas,
    pub base_width: u32,
    pub zoom_ease: Ease,
}

impl Default for CompositorOpts {
    fn default() -> Self {
        Self {
            canvas: Canvas {
                width: 1920,
                height: 1080,
            },
            base_width: DEFAULT_BASE_WIDTH,
            zoom_ease: Ease::InOutSine,
        }
    }
}

impl CompositorOpts {
    /// 1080p canvas for `aspect`, with subtitle sizes scaled against that orientation's width.
    pub fn for_aspect(aspect: AspectRatio) -> Self {
        let canvas = aspect.base_canvas();
        Self {
            canvas,
            base_width: canvas.width,
            ..Self::default()
        }
    }

    pub fn with_canvas(mut self, canvas: Canvas) -> Self {
        self.canvas = canvas;
        self
    }

    pub fn with_base_width(mut self, base_width: u32) -> Self {
        self.base_width = base_width.max(1);
        self
    }

    /// Font scale factor for the current canvas.
    pub fn text_scale(&self) -> f64 {
        f64::from(self.canvas.width) / f64::from(self.base_width.max(1))
    }
}

/// Everything one frame depends on.
#[derive(Clone, Copy)]
pub struct FrameInput<'a> {
    pub elapsed: f64,
    pub timeline: &'a Timeline,
    pub scenes: &'a [Scene],
    pub assets: AssetView<'a>,
    pub style: &'a SubtitleStyle,
    /// Narration level in `[0, 1]`.
    pub amplitude: f32,
    /// Playing or exporting.
    pub animating: bool,
    pub subtitles: bool,
    pub watermark: bool,
    pub speed: f64,
}

/// Project-level inputs that stay fixed from tick to tick.
#[derive(Clone, Copy)]
pub struct FrameContext<'a> {
    pub timeline: &'a Timeline,
    pub scenes: &'a [Scene],
    pub assets: AssetView<'a>,
    pub style: &'a SubtitleStyle,
    pub subtitles: bool,
    pub watermark: bool,
    pub speed: f64,
}

impl<'a> FrameContext<'a> {
    pub fn for_project(project: &'a Project, timeline: &'a Timeline, assets: AssetView<'a>) -> Self {
        Self {
            timeline,
            scenes: &project.scenes,
            assets,
            style: &project.style,
            subtitles: project.subtitles_enabled,
            watermark: project.watermark_required,
            speed: project.voice_speed,
        }
    }

    pub fn at(&self, elapsed: f64, amplitude: f32, animating: bool) -> FrameInput<'a> {
        FrameInput {
            elapsed,
            timeline: self.timeline,
            scenes: self.scenes,
            assets: self.assets,
            style: self.style,
            amplitude,
            animating,
            subtitles: self.subtitles,
            watermark: self.watermark,
            speed: self.speed,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VisualSample {
    Image,
    /// Source position in seconds.
    Video { source_time: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisualPlan {
    pub scene: SceneId,
    /// Destination of the whole source image on the canvas (overflows when zoomed).
    pub dest: Rect,
    pub sample: VisualSample,
}

/// Backend-independent description of one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FramePlan {
    pub canvas: Canvas,
    pub background: Rgba8Premul,
    pub visual: Option<VisualPlan>,
    pub subtitles: Option<SubtitleLayer>,
    pub watermark: Option<Rect>,
    /// Index of the active span, if the timeline has any.
    pub scene_index: Option<usize>,
    pub progress: f64,
    pub finished: bool,
}

/// A rendered frame and where on the timeline it was taken.
#[derive(Clone, Debug)]
pub struct FrameOutcome {
    pub frame: FrameRGBA,
    pub scene_index: Option<usize>,
    pub progress: f64,
    /// `elapsed` is at or past the end of the timeline.
    pub finished: bool,
}

/// Plan a frame without touching pixels.
pub fn plan_frame(
    input: &FrameInput<'_>,
    opts: &CompositorOpts,
    measure: &mut dyn TextMeasure,
) -> FramePlan {
    let canvas = opts.canvas;
    let hit = input.timeline.locate(input.elapsed);
    let mut plan = FramePlan {
        canvas,
        background: BACKGROUND,
        visual: None,
        subtitles: None,
        watermark: None,
        scene_index: hit.map(|h| h.index),
        progress: hit.map_or(0.0, |h| h.progress),
        finished: hit.is_some_and(|h| h.finished),
    };

    let scene = hit.and_then(|h| input.scenes.iter().find(|s| s.id == h.span.scene));

    if let (Some(hit), Some(scene)) = (hit, scene) {
        if let Some(asset) = input.assets.visual(scene.id) {
            let (max_zoom, sample) = match asset {
                VisualAsset::Image(_) => (IMAGE_MAX_ZOOM, VisualSample::Image),
                VisualAsset::Video(info) => {
                    let local = (input.elapsed - hit.span.start).max(0.0) * input.speed;
                    (
                        VIDEO_MAX_ZOOM,
                        VisualSample::Video {
                            source_time: wrap_positive(local, info.loop_duration_secs()),
                        },
                    )
                }
            };
            let zoom = zoom_at(
                opts.zoom_ease,
                max_zoom,
                hit.progress,
                input.amplitude,
                input.animating,
            );
            let (w, h) = asset.size();
            plan.visual = cover_rect(w, h, canvas, zoom).map(|dest| VisualPlan {
                scene: scene.id,
                dest,
                sample,
            });
        }

        if input.subtitles {
            plan.subtitles = plan_subtitles(
                &SubtitleParams {
                    text: &scene.voiceover,
                    style: input.style,
                    progress: hit.progress,
                    animating: input.animating,
                    canvas,
                    scale: opts.text_scale(),
                },
                measure,
            );
        }
    }

    if input.watermark
        && let Some(img) = input.assets.watermark()
        && img.width > 0
    {
        let cw = f64::from(canvas.width);
        let tw = cw * WATERMARK_WIDTH_FRACTION;
        let th = tw * f64::from(img.height) / f64::from(img.width);
        let x = cw - tw - WATERMARK_PADDING_PX;
        let y = WATERMARK_PADDING_PX;
        plan.watermark = Some(Rect::new(x, y, x + tw, y + th));
    }

    plan
}

/// Frame compositor over a raster backend.
pub struct Compositor<B: RasterBackend = CpuBackend> {
    opts: CompositorOpts,
    backend: B,
}

impl Compositor<CpuBackend> {
    pub fn new(opts: CompositorOpts) -> Self {
        Self::with_backend(opts, CpuBackend::default())
    }
}

impl<B: RasterBackend> Compositor<B> {
    pub fn with_backend(opts: CompositorOpts, backend: B) -> Self {
        Self { opts, backend }
    }

    pub fn opts(&self) -> &CompositorOpts {
        &self.opts
    }

    pub fn canvas(&self) -> Canvas {
        self.opts.canvas
    }

    /// Resize the output; the next frame renders at the new size.
    pub fn set_canvas(&mut self, canvas: Canvas) {
        self.opts.canvas = canvas;
    }

    pub fn set_opts(&mut self, opts: CompositorOpts) {
        self.opts = opts;
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn plan(&mut self, input: &FrameInput<'_>) -> FramePlan {
        plan_frame(
            input,
            &self.opts,
            self.backend.text_measure(input.style.font_weight),
        )
    }

    pub fn render_frame(&mut self, input: &FrameInput<'_>) -> ReelResult<FrameOutcome> {
        let plan = plan_frame(
            input,
            &self.opts,
            self.backend.text_measure(input.style.font_weight),
        );
        let frame = self.backend.rasterize(&plan, &input.assets)?;
        Ok(FrameOutcome {
            frame,
            scene_index: plan.scene_index,
            progress: plan.progress,
            finished: plan.finished,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
