use super::*;
use crate::animation::subtitle::{TextItem, TextOutline, TextShadow};
use crate::assets::store::AssetCache;
use crate::foundation::core::{Point, Rgba8Premul};

const ACTIVE: f64 = 1.25;

fn item(text: &str, y: f64, scale: f64) -> TextItem {
    TextItem {
        text: text.to_owned(),
        x: 20.0,
        y,
        width: 100.0,
        color: Color::rgba(1.0, 1.0, 1.0, 1.0),
        scale,
        pivot: Point::new(70.0, y),
    }
}

fn layer(items: Vec<TextItem>) -> SubtitleLayer {
    SubtitleLayer {
        font_size: 32.0,
        font_weight: 700,
        outline: Some(TextOutline {
            color: Color::rgba(0.0, 0.0, 0.0, 1.0),
            width: 4.0,
        }),
        shadow: Some(TextShadow {
            color: Color::rgba(0.0, 0.0, 0.0, 0.8),
            blur: 5.0,
            offset: Vec2::new(2.0, 2.0),
        }),
        chips: Vec::new(),
        items,
    }
}

fn plan(canvas: Canvas, subtitles: Option<SubtitleLayer>) -> FramePlan {
    FramePlan {
        canvas,
        background: Rgba8Premul {
            r: 5,
            g: 5,
            b: 5,
            a: 255,
        },
        visual: None,
        subtitles,
        watermark: None,
        scene_index: None,
        progress: 0.0,
        finished: false,
    }
}

#[test]
fn ring_offsets_grow_with_radius() {
    assert!(ring_offsets(0.0).is_empty());
    assert!(ring_offsets(f64::NAN).is_empty());
    assert_eq!(ring_offsets(2.0).len(), 8);
    let wide = ring_offsets(4.0);
    assert_eq!(wide.len(), 16);
    assert!(wide.iter().all(|d| (d.hypot() - 4.0).abs() < 1e-9));
}

#[test]
fn text_band_is_padded_and_clamped() {
    let l = layer(vec![item("a", 100.0, 1.0), item("b", 140.0, ACTIVE)]);
    let kernel = shadow_kernel(5.0).unwrap();
    let (y0, y1) = text_band(&l, &kernel, 1000);
    assert!(y0 < 100 && y0 > 0);
    assert!(y1 > 140 && y1 < 1000);

    let (y0, y1) = text_band(&l, &kernel, 120);
    assert!(y0 > 0);
    assert_eq!(y1, 120);
    assert_eq!(text_band(&layer(Vec::new()), &kernel, 120), (0, 0));
}

#[test]
fn frame_keys_are_milliseconds() {
    assert_eq!(key_for_time(0.0), 0);
    assert_eq!(key_for_time(-3.0), 0);
    assert_eq!(key_for_time(1.2344), 1234);
    assert_eq!(key_for_time(1.2346), 1235);
}

#[test]
fn pixmap_rejects_size_mismatch() {
    assert!(pixmap_from_premul_bytes(&[0u8; 12], 2, 2).is_err());
    assert!(pixmap_from_premul_bytes(&[], 0, 0).is_err());
    let pm = pixmap_from_premul_bytes(&[9u8; 16], 2, 2).unwrap();
    assert_eq!((pm.width(), pm.height()), (2, 2));
}

#[test]
fn fontless_backend_measures_but_draws_no_text() {
    let mut backend = CpuBackend::without_font();
    assert!(!backend.has_font());
    assert!(backend.text_measure(400).measure("abcd", 10.0) > 0.0);

    let canvas = Canvas {
        width: 200,
        height: 100,
    };
    let cache = AssetCache::default();
    let frame = backend
        .rasterize(&plan(canvas, Some(layer(vec![item("hello", 50.0, 1.0)]))), &cache.view())
        .unwrap();
    assert!(frame.premultiplied);
    assert!(frame.data.chunks_exact(4).all(|p| p == [5, 5, 5, 255]));
}

#[test]
fn oversized_canvas_is_rejected() {
    let mut backend = CpuBackend::without_font();
    let cache = AssetCache::default();
    let canvas = Canvas {
        width: 70_000,
        height: 1,
    };
    assert!(backend.rasterize(&plan(canvas, None), &cache.view()).is_err());
}

#[test]
fn system_font_draws_outlined_text_with_shadow() {
    let Some((_, bytes)) = resolve_font_bytes(None, None) else {
        eprintln!("no system font available, skipping");
        return;
    };
    let engine = TextLayoutEngine::from_font_bytes(bytes).unwrap();
    let mut backend = CpuBackend::with_text_engine(engine);
    assert!(backend.has_font());

    let canvas = Canvas {
        width: 200,
        height: 100,
    };
    let cache = AssetCache::default();
    let frame = backend
        .rasterize(&plan(canvas, Some(layer(vec![item("HELLO", 50.0, 1.0)]))), &cache.view())
        .unwrap();

    let bright = frame.data.chunks_exact(4).filter(|p| p[0] > 200).count();
    assert!(bright > 20, "expected glyph fill pixels, got {bright}");
    assert!(frame.data.chunks_exact(4).all(|p| p[3] == 255));
    // Far corner stays untouched.
    assert_eq!(frame.pixel(199, 0), Some([5, 5, 5, 255]));
}

#[test]
fn oversized_image_leaves_the_background() {
    let huge = PreparedImage {
        width: 70_000,
        height: 1,
        rgba8_premul: Arc::new(vec![255u8; 70_000 * 4]),
    };
    let mut cache = AssetCache::default();
    cache.insert_visual(SceneId(1), VisualAsset::Image(huge.clone()));
    cache.set_watermark(huge);

    let canvas = Canvas {
        width: 40,
        height: 20,
    };
    let mut frame_plan = plan(canvas, None);
    frame_plan.visual = Some(VisualPlan {
        scene: SceneId(1),
        dest: Rect::new(0.0, 0.0, 40.0, 20.0),
        sample: VisualSample::Image,
    });
    frame_plan.watermark = Some(Rect::new(30.0, 2.0, 38.0, 4.0));

    let mut backend = CpuBackend::without_font();
    for _ in 0..2 {
        let frame = backend.rasterize(&frame_plan, &cache.view()).unwrap();
        assert!(frame.data.chunks_exact(4).all(|p| p == [5, 5, 5, 255]));
    }
    assert!(backend.unpaintable.contains_key(&SceneId(1)));
    assert!(backend.watermark_unpaintable.is_some());
}
