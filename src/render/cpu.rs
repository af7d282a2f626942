use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use crate::animation::subtitle::SubtitleLayer;
use crate::assets::color::Color;
use crate::assets::decode::{PreparedImage, premultiply_rgba8_in_place};
use crate::assets::media::{self, VideoSourceInfo};
use crate::assets::store::{AssetView, VisualAsset};
use crate::assets::text::{ApproxMeasure, TextLayoutEngine, TextMeasure, resolve_font_bytes};
use crate::foundation::core::{Affine, Canvas, Rect, Vec2};
use crate::foundation::error::{ReelError, ReelResult};
use crate::model::scene::SceneId;
use crate::render::backend::{FrameRGBA, RasterBackend};
use crate::render::compositor::{FramePlan, VisualPlan, VisualSample, WATERMARK_OPACITY};
use crate::render::effects::{
    ColorMatrix, ToneFilter, VignetteMask, blur_rgba8_premul_q16, clear_rgba8,
    color_matrix_rgba8_premul, premul_over_in_place, shadow_kernel,
};

/// Environment variable overriding how many decoded frames each video keeps.
pub const VIDEO_CACHE_ENV: &str = "STORYREEL_VIDEO_CACHE_CAPACITY";
const DEFAULT_VIDEO_CACHE_CAPACITY: usize = 64;

#[derive(Clone, Debug, Default)]
pub struct CpuBackendOpts {
    /// Subtitle font; falls back to `STORYREEL_FONT` and system fonts.
    pub font_path: Option<PathBuf>,
    /// Family looked up in the font directories when no path is given.
    pub font_family: Option<String>,
}

/// `vello_cpu` rasterizer for [`FramePlan`]s.
pub struct CpuBackend {
    text: TextSource,
    images: HashMap<SceneId, ImagePaint>,
    /// Image sources that failed to become paints, so the warning is logged once.
    unpaintable: HashMap<SceneId, Arc<Vec<u8>>>,
    watermark: Option<ImagePaint>,
    watermark_unpaintable: Option<Arc<Vec<u8>>>,
    video_decoders: HashMap<SceneId, VideoFrameDecoder>,
    tone: ColorMatrix,
    vignette: Option<VignetteMask>,
    shadow_kernels: HashMap<u64, Vec<u32>>,
    layer: Option<vello_cpu::Pixmap>,
    scratch: Vec<u8>,
    blur_tmp: Vec<u8>,
}

enum TextSource {
    Font(Box<TextLayoutEngine>),
    Approx(ApproxMeasure),
}

struct ImagePaint {
    source: Arc<Vec<u8>>,
    paint: vello_cpu::Image,
    width: f64,
    height: f64,
}

struct VideoFrameDecoder {
    info: Arc<VideoSourceInfo>,
    frame_cache: HashMap<u64, vello_cpu::Image>,
    lru: VecDeque<u64>,
    capacity: usize,
    warned: bool,
}

impl VideoFrameDecoder {
    fn new(info: Arc<VideoSourceInfo>) -> Self {
        let capacity = std::env::var(VIDEO_CACHE_ENV)
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_VIDEO_CACHE_CAPACITY);
        Self {
            info,
            frame_cache: HashMap::new(),
            lru: VecDeque::new(),
            capacity,
            warned: false,
        }
    }

    fn decode_at(&mut self, source_time_s: f64) -> ReelResult<vello_cpu::Image> {
        let key = key_for_time(source_time_s);
        if let Some(img) = self.frame_cache.get(&key).cloned() {
            self.touch(key);
            return Ok(img);
        }

        let mut rgba = media::decode_video_frame_rgba8(&self.info, source_time_s)?;
        premultiply_rgba8_in_place(&mut rgba);
        let pixmap = pixmap_from_premul_bytes(&rgba, self.info.width, self.info.height)?;
        let image = image_paint(pixmap);
        self.insert_frame(key, image.clone());
        Ok(image)
    }

    fn insert_frame(&mut self, key: u64, image: vello_cpu::Image) {
        self.frame_cache.insert(key, image);
        self.touch(key);
        while self.lru.len() > self.capacity {
            if let Some(old) = self.lru.pop_front() {
                self.frame_cache.remove(&old);
            }
        }
    }

    fn touch(&mut self, key: u64) {
        if let Some(pos) = self.lru.iter().position(|x| *x == key) {
            self.lru.remove(pos);
        }
        self.lru.push_back(key);
    }
}

/// Frames are cached per millisecond of source time.
fn key_for_time(source_time_s: f64) -> u64 {
    (source_time_s.max(0.0) * 1000.0).round() as u64
}

struct ShapedRun {
    font_size: f32,
    glyphs: Vec<vello_cpu::Glyph>,
}

/// One subtitle item with its glyphs and where they land on the canvas.
struct ShapedItem {
    transform: Affine,
    color: Color,
    runs: Vec<ShapedRun>,
}

impl CpuBackend {
    pub fn new(opts: CpuBackendOpts) -> Self {
        let font = resolve_font_bytes(opts.font_path.as_deref(), opts.font_family.as_deref());
        let text = match font {
            Some((path, bytes)) => match TextLayoutEngine::from_font_bytes(bytes) {
                Ok(engine) => {
                    tracing::debug!(
                        path = %path.display(),
                        family = engine.family_name(),
                        "subtitle font loaded"
                    );
                    TextSource::Font(Box::new(engine))
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), "subtitle font unusable: {e}");
                    TextSource::Approx(ApproxMeasure)
                }
            },
            None => {
                tracing::warn!("no subtitle font found; subtitles will not be drawn");
                TextSource::Approx(ApproxMeasure)
            }
        };
        Self::with_text(text)
    }

    pub fn with_text_engine(engine: TextLayoutEngine) -> Self {
        Self::with_text(TextSource::Font(Box::new(engine)))
    }

    /// Backend that measures text approximately and never draws glyphs.
    pub fn without_font() -> Self {
        Self::with_text(TextSource::Approx(ApproxMeasure))
    }

    fn with_text(text: TextSource) -> Self {
        Self {
            text,
            images: HashMap::new(),
            unpaintable: HashMap::new(),
            watermark: None,
            watermark_unpaintable: None,
            video_decoders: HashMap::new(),
            tone: ToneFilter::default().matrix(),
            vignette: None,
            shadow_kernels: HashMap::new(),
            layer: None,
            scratch: Vec::new(),
            blur_tmp: Vec::new(),
        }
    }

    pub fn has_font(&self) -> bool {
        matches!(self.text, TextSource::Font(_))
    }

    /// Draw into the transparent layer pixmap.
    fn render_layer(&mut self, w: u16, h: u16, draw: impl FnOnce(&mut vello_cpu::RenderContext)) {
        let mut ctx = vello_cpu::RenderContext::new(w, h);
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        draw(&mut ctx);
        ctx.flush();

        let mut pixmap = match self.layer.take() {
            Some(pm) if pm.width() == w && pm.height() == h => pm,
            _ => vello_cpu::Pixmap::new(w, h),
        };
        pixmap.data_as_u8_slice_mut().fill(0);
        ctx.render_to_pixmap(&mut pixmap);
        self.layer = Some(pixmap);
    }

    fn layer_bytes(&self) -> ReelResult<&[u8]> {
        self.layer
            .as_ref()
            .map(|pm| pm.data_as_u8_slice())
            .ok_or_else(|| ReelError::validation("layer pixmap was not rendered"))
    }

    fn draw_visual(
        &mut self,
        visual: &VisualPlan,
        assets: &AssetView<'_>,
        canvas: Canvas,
        out: &mut [u8],
    ) -> ReelResult<()> {
        let Some(asset) = assets.visual(visual.scene) else {
            return Ok(());
        };
        let paint = match asset {
            VisualAsset::Image(img) => self.image_paint_for(visual.scene, img),
            VisualAsset::Video(info) => {
                let source_time = match visual.sample {
                    VisualSample::Video { source_time } => source_time,
                    VisualSample::Image => 0.0,
                };
                self.video_paint_for(visual.scene, info, source_time)
            }
        };
        let Some((paint, sw, sh)) = paint else {
            return Ok(());
        };

        let (w, h) = canvas_u16(canvas)?;
        let dest = visual.dest;
        let transform = Affine::translate((dest.x0, dest.y0))
            * Affine::scale_non_uniform(dest.width() / sw, dest.height() / sh);
        self.render_layer(w, h, |ctx| {
            ctx.set_transform(affine_to_cpu(transform));
            ctx.set_paint(paint);
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, sw, sh));
        });

        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.resize(out.len(), 0);
        color_matrix_rgba8_premul(self.layer_bytes()?, &mut scratch, self.tone);
        premul_over_in_place(out, &scratch)?;
        self.scratch = scratch;

        let vignette = match self.vignette.take() {
            Some(v) if v.matches(canvas.width, canvas.height) => v,
            _ => VignetteMask::new(canvas.width, canvas.height),
        };
        let applied = vignette.apply(out);
        self.vignette = Some(vignette);
        applied
    }

    fn draw_subtitles(
        &mut self,
        layer: &SubtitleLayer,
        canvas: Canvas,
        out: &mut [u8],
    ) -> ReelResult<()> {
        let TextSource::Font(engine) = &mut self.text else {
            return Ok(());
        };
        engine.set_weight(layer.font_weight);
        let font = engine.font_data().clone();
        let shaped = shape_items(engine, layer)?;
        if shaped.is_empty() {
            return Ok(());
        }
        let (w, h) = canvas_u16(canvas)?;
        let ring = layer
            .outline
            .map(|o| ring_offsets(o.width / 2.0))
            .unwrap_or_default();

        if let Some(shadow) = layer.shadow {
            let fill = paint_color(shadow.color);
            self.render_layer(w, h, |ctx| {
                let offset = Affine::translate(shadow.offset);
                for item in &shaped {
                    for &d in ring.iter().chain(std::iter::once(&Vec2::ZERO)) {
                        ctx.set_paint(fill);
                        draw_glyphs(ctx, &font, offset * item.transform * Affine::translate(d), item);
                    }
                }
            });
            let kernel = match self.shadow_kernels.get(&shadow.blur.to_bits()) {
                Some(k) => k.clone(),
                None => {
                    let k = shadow_kernel(shadow.blur)?;
                    self.shadow_kernels.insert(shadow.blur.to_bits(), k.clone());
                    k
                }
            };
            let (y0, y1) = text_band(layer, &kernel, canvas.height);
            self.blur_layer_rows(canvas.width, y0, y1, &kernel)?;
            premul_over_in_place(out, self.layer_bytes()?)?;
        }

        let outline_paint = layer.outline.map(|o| paint_color(o.color));
        self.render_layer(w, h, |ctx| {
            for chip in &layer.chips {
                ctx.set_transform(affine_to_cpu(about_pivot(chip.scale, chip.pivot.to_vec2())));
                ctx.set_paint(paint_color(chip.color));
                ctx.fill_rect(&rect_to_cpu(chip.rect));
            }
            if let Some(outline) = outline_paint {
                for item in &shaped {
                    for &d in &ring {
                        ctx.set_paint(outline);
                        draw_glyphs(ctx, &font, item.transform * Affine::translate(d), item);
                    }
                }
            }
            for item in &shaped {
                ctx.set_paint(paint_color(item.color));
                draw_glyphs(ctx, &font, item.transform, item);
            }
        });
        premul_over_in_place(out, self.layer_bytes()?)
    }

    /// Blur rows `y0..y1` of the layer in place.
    fn blur_layer_rows(&mut self, width: u32, y0: u32, y1: u32, kernel: &[u32]) -> ReelResult<()> {
        if y1 <= y0 {
            return Ok(());
        }
        let row_bytes = width as usize * 4;
        let range = y0 as usize * row_bytes..y1 as usize * row_bytes;
        let band_len = range.len();

        let mut blurred = std::mem::take(&mut self.scratch);
        let mut tmp = std::mem::take(&mut self.blur_tmp);
        blurred.resize(band_len, 0);
        tmp.resize(band_len, 0);

        let pixmap = self
            .layer
            .as_mut()
            .ok_or_else(|| ReelError::validation("layer pixmap was not rendered"))?;
        let band = &mut pixmap.data_as_u8_slice_mut()[range];
        blur_rgba8_premul_q16(
            band,
            &mut blurred[..band_len],
            &mut tmp[..band_len],
            width,
            y1 - y0,
            kernel,
        );
        band.copy_from_slice(&blurred[..band_len]);

        self.scratch = blurred;
        self.blur_tmp = tmp;
        Ok(())
    }

    fn draw_watermark(
        &mut self,
        rect: Rect,
        img: &PreparedImage,
        canvas: Canvas,
        out: &mut [u8],
    ) -> ReelResult<()> {
        let stale = self
            .watermark
            .as_ref()
            .is_none_or(|p| !Arc::ptr_eq(&p.source, &img.rgba8_premul));
        let known_bad = self
            .watermark_unpaintable
            .as_ref()
            .is_some_and(|src| Arc::ptr_eq(src, &img.rgba8_premul));
        if stale && !known_bad {
            self.watermark = match build_image_paint(img) {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!("watermark cannot be drawn, skipping it: {e}");
                    self.watermark_unpaintable = Some(Arc::clone(&img.rgba8_premul));
                    None
                }
            };
        }
        if known_bad {
            return Ok(());
        }
        let Some(wm) = self.watermark.as_ref() else {
            return Ok(());
        };
        let (paint, sw, sh) = (wm.paint.clone(), wm.width, wm.height);

        let (w, h) = canvas_u16(canvas)?;
        let transform = Affine::translate((rect.x0, rect.y0))
            * Affine::scale_non_uniform(rect.width() / sw, rect.height() / sh);
        self.render_layer(w, h, |ctx| {
            ctx.set_transform(affine_to_cpu(transform));
            ctx.set_paint(paint);
            ctx.push_opacity_layer(WATERMARK_OPACITY);
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, sw, sh));
            ctx.pop_layer();
        });
        premul_over_in_place(out, self.layer_bytes()?)
    }

    /// `None` when the image cannot become a paint; the scene then shows background only.
    fn image_paint_for(
        &mut self,
        scene: SceneId,
        img: &PreparedImage,
    ) -> Option<(vello_cpu::Image, f64, f64)> {
        if let Some(p) = self.images.get(&scene)
            && Arc::ptr_eq(&p.source, &img.rgba8_premul)
        {
            return Some((p.paint.clone(), p.width, p.height));
        }
        if self
            .unpaintable
            .get(&scene)
            .is_some_and(|src| Arc::ptr_eq(src, &img.rgba8_premul))
        {
            return None;
        }
        match build_image_paint(img) {
            Ok(p) => {
                let out = (p.paint.clone(), p.width, p.height);
                self.images.insert(scene, p);
                self.unpaintable.remove(&scene);
                Some(out)
            }
            Err(e) => {
                tracing::warn!(
                    scene = scene.0,
                    width = img.width,
                    height = img.height,
                    "image cannot be drawn, skipping visual: {e}"
                );
                self.unpaintable.insert(scene, Arc::clone(&img.rgba8_premul));
                None
            }
        }
    }

    fn video_paint_for(
        &mut self,
        scene: SceneId,
        info: &Arc<VideoSourceInfo>,
        source_time: f64,
    ) -> Option<(vello_cpu::Image, f64, f64)> {
        let decoder = self
            .video_decoders
            .entry(scene)
            .or_insert_with(|| VideoFrameDecoder::new(Arc::clone(info)));
        if !Arc::ptr_eq(&decoder.info, info) {
            *decoder = VideoFrameDecoder::new(Arc::clone(info));
        }
        match decoder.decode_at(source_time) {
            Ok(image) => Some((image, f64::from(info.width), f64::from(info.height))),
            Err(e) => {
                if !decoder.warned {
                    decoder.warned = true;
                    tracing::warn!(scene = scene.0, "video frame unavailable, skipping visual: {e}");
                }
                None
            }
        }
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new(CpuBackendOpts::default())
    }
}

impl RasterBackend for CpuBackend {
    fn text_measure(&mut self, weight: u16) -> &mut dyn TextMeasure {
        match &mut self.text {
            TextSource::Font(engine) => {
                engine.set_weight(weight);
                engine.as_mut()
            }
            TextSource::Approx(approx) => approx,
        }
    }

    #[tracing::instrument(level = "trace", skip_all, fields(w = plan.canvas.width, h = plan.canvas.height))]
    fn rasterize(&mut self, plan: &FramePlan, assets: &AssetView<'_>) -> ReelResult<FrameRGBA> {
        let canvas = plan.canvas;
        canvas_u16(canvas)?;
        let mut out = vec![0u8; canvas.width as usize * canvas.height as usize * 4];
        clear_rgba8(&mut out, plan.background.to_array());

        if let Some(visual) = &plan.visual {
            self.draw_visual(visual, assets, canvas, &mut out)?;
        }
        if let Some(subtitles) = &plan.subtitles {
            self.draw_subtitles(subtitles, canvas, &mut out)?;
        }
        if let (Some(rect), Some(img)) = (plan.watermark, assets.watermark()) {
            self.draw_watermark(rect, img, canvas, &mut out)?;
        }

        Ok(FrameRGBA {
            width: canvas.width,
            height: canvas.height,
            data: out,
            premultiplied: true,
        })
    }
}

fn shape_items(engine: &mut TextLayoutEngine, layer: &SubtitleLayer) -> ReelResult<Vec<ShapedItem>> {
    let size = layer.font_size as f32;
    let mut shaped = Vec::with_capacity(layer.items.len());
    for item in &layer.items {
        if item.text.trim().is_empty() {
            continue;
        }
        let layout = engine.layout_line(&item.text, size)?;
        let Some(first) = layout.lines().next() else {
            continue;
        };
        let m = first.metrics();
        let middle = f64::from(m.baseline - (m.ascent - m.descent) / 2.0);

        let mut runs = Vec::new();
        for line in layout.lines() {
            for positioned in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = positioned else {
                    continue;
                };
                runs.push(ShapedRun {
                    font_size: run.run().font_size(),
                    glyphs: run
                        .positioned_glyphs()
                        .map(|g| vello_cpu::Glyph {
                            id: g.id,
                            x: g.x,
                            y: g.y,
                        })
                        .collect(),
                });
            }
        }
        shaped.push(ShapedItem {
            transform: about_pivot(item.scale, item.pivot.to_vec2())
                * Affine::translate((item.x, item.y - middle)),
            color: item.color,
            runs,
        });
    }
    Ok(shaped)
}

fn draw_glyphs(
    ctx: &mut vello_cpu::RenderContext,
    font: &vello_cpu::peniko::FontData,
    transform: Affine,
    item: &ShapedItem,
) {
    ctx.set_transform(affine_to_cpu(transform));
    for run in &item.runs {
        ctx.glyph_run(font)
            .font_size(run.font_size)
            .fill_glyphs(run.glyphs.iter().copied());
    }
}

/// Offsets that approximate a stroke of half-width `radius` with repeated fills.
fn ring_offsets(radius: f64) -> Vec<Vec2> {
    if !radius.is_finite() || radius <= 0.0 {
        return Vec::new();
    }
    let n = if radius > 3.0 { 16 } else { 8 };
    (0..n)
        .map(|k| {
            let a = std::f64::consts::TAU * f64::from(k) / f64::from(n);
            Vec2::new(radius * a.cos(), radius * a.sin())
        })
        .collect()
}

/// Rows that can receive shadow pixels, padded by glyph extent and blur radius.
fn text_band(layer: &SubtitleLayer, kernel: &[u32], height: u32) -> (u32, u32) {
    let max_scale = layer.items.iter().map(|i| i.scale).fold(1.0, f64::max);
    let outline = layer.outline.map_or(0.0, |o| o.width);
    let shift = layer.shadow.map_or(0.0, |s| s.offset.y.abs());
    let pad = layer.font_size * max_scale + outline + shift + (kernel.len() / 2) as f64;
    let (lo, hi) = layer
        .items
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), i| {
            (lo.min(i.y), hi.max(i.y))
        });
    if !lo.is_finite() {
        return (0, 0);
    }
    let h = f64::from(height);
    let y0 = (lo - pad).floor().clamp(0.0, h) as u32;
    let y1 = (hi + pad).ceil().clamp(0.0, h) as u32;
    (y0, y1)
}

fn about_pivot(scale: f64, pivot: Vec2) -> Affine {
    Affine::translate(pivot) * Affine::scale(scale) * Affine::translate(-pivot)
}

fn paint_color(color: Color) -> vello_cpu::peniko::Color {
    let [r, g, b, a] = color.to_straight_rgba8();
    vello_cpu::peniko::Color::from_rgba8(r, g, b, a)
}

fn canvas_u16(canvas: Canvas) -> ReelResult<(u16, u16)> {
    let w: u16 = canvas
        .width
        .try_into()
        .map_err(|_| ReelError::validation("canvas width exceeds u16"))?;
    let h: u16 = canvas
        .height
        .try_into()
        .map_err(|_| ReelError::validation("canvas height exceeds u16"))?;
    Ok((w, h))
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn rect_to_cpu(r: Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

fn image_paint(pixmap: vello_cpu::Pixmap) -> vello_cpu::Image {
    vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    }
}

fn build_image_paint(img: &PreparedImage) -> ReelResult<ImagePaint> {
    let pixmap = pixmap_from_premul_bytes(img.rgba8_premul.as_slice(), img.width, img.height)?;
    Ok(ImagePaint {
        source: Arc::clone(&img.rgba8_premul),
        paint: image_paint(pixmap),
        width: f64::from(img.width),
        height: f64::from(img.height),
    })
}

fn pixmap_from_premul_bytes(
    rgba8_premul: &[u8],
    width: u32,
    height: u32,
) -> ReelResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| ReelError::asset_decode("image width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| ReelError::asset_decode("image height exceeds u16"))?;
    if w == 0 || h == 0 {
        return Err(ReelError::asset_decode("image has zero size"));
    }
    if rgba8_premul.len() != width as usize * height as usize * 4 {
        return Err(ReelError::asset_decode("prepared image byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let pixels = rgba8_premul
        .chunks_exact(4)
        .map(|px| {
            may_have_opacities |= px[3] != 255;
            vello_cpu::peniko::color::PremulRgba8 {
                r: px[0],
                g: px[1],
                b: px[2],
                a: px[3],
            }
        })
        .collect();

    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}

#[cfg(test)]
#[path = "../../tests/unit/render/cpu.rs"]
mod tests;
