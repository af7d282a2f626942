use std::io::Cursor;

use super::*;
use crate::model::scene::{NarrationAudio, Scene};

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "storyreel_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_png(path: &Path, w: u32, h: u32) {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba([10, 20, 30, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    std::fs::write(path, &buf).unwrap();
}

#[test]
fn narration_decodes_once_and_is_queryable() {
    let mut cache = AssetCache::default();
    let scene = Scene::new(1, "hi").with_narration(NarrationAudio::Pcm16(Arc::new(vec![0u8; 48_000])));
    assert!(!cache.is_audio_ready(scene.id));
    cache.ensure_decoded(&scene);
    assert!(cache.is_audio_ready(scene.id));
    let buf = cache.view().narration(&scene).unwrap();
    assert!((buf.duration_secs() - 1.0).abs() < 1e-9);

    // Same bytes in a fresh allocation: the cached buffer is kept.
    let same = Scene {
        narration: Some(NarrationAudio::Pcm16(Arc::new(vec![0u8; 48_000]))),
        ..scene.clone()
    };
    cache.ensure_decoded(&same);
    assert!(Arc::ptr_eq(&cache.view().narration(&same).unwrap(), &buf));
}

#[test]
fn replaced_payload_is_decoded_again() {
    let mut cache = AssetCache::default();
    let broken = Scene::new(4, "retake").with_narration(NarrationAudio::Pcm16(Arc::new(vec![7u8])));
    cache.ensure_decoded(&broken);
    assert!(!cache.is_audio_ready(broken.id));

    let regenerated = Scene {
        narration: Some(NarrationAudio::Pcm16(Arc::new(vec![0u8; 48_000]))),
        ..broken.clone()
    };
    cache.ensure_decoded(&regenerated);
    assert!(cache.is_audio_ready(regenerated.id));
    let first = cache.view().narration(&regenerated).unwrap();
    assert!((first.duration_secs() - 1.0).abs() < 1e-9);

    // A re-voiced scene drops the old buffer.
    let revoiced = Scene {
        narration: Some(NarrationAudio::Pcm16(Arc::new(vec![0u8; 96_000]))),
        ..broken.clone()
    };
    cache.ensure_decoded(&revoiced);
    let second = cache.view().narration(&revoiced).unwrap();
    assert!((second.duration_secs() - 2.0).abs() < 1e-9);

    let cleared = Scene {
        narration: None,
        ..broken
    };
    cache.ensure_decoded(&cleared);
    assert!(!cache.is_audio_ready(cleared.id));
}

#[test]
fn undecodable_narration_is_absorbed() {
    let mut cache = AssetCache::default();
    let empty = Scene::new(1, "a").with_narration(NarrationAudio::Pcm16(Arc::new(Vec::new())));
    let bad_b64 = Scene::new(2, "b").with_narration(NarrationAudio::Base64("@@@".to_owned()));
    let silent = Scene::new(3, "c");
    cache.prepare(&[empty.clone(), bad_b64.clone(), silent.clone()]);
    let view = cache.view();
    assert!(view.narration(&empty).is_none());
    assert!(view.narration(&bad_b64).is_none());
    assert!(view.narration(&silent).is_none());
}

#[test]
fn base64_narration_decodes() {
    let mut cache = AssetCache::default();
    // Three zero samples, line-wrapped.
    let scene = Scene::new(9, "x").with_narration(NarrationAudio::Base64("AAAA\nAAAA\n".to_owned()));
    cache.ensure_decoded(&scene);
    assert_eq!(cache.view().narration(&scene).unwrap().frames(), 3);
}

#[test]
fn attached_buffer_wins_over_cache() {
    let cache = AssetCache::default();
    let pcm = Arc::new(AudioPcm {
        sample_rate: 10,
        channels: 1,
        interleaved_f32: vec![0.0; 20],
    });
    let scene = Scene::new(1, "x").with_narration(NarrationAudio::Buffer(Arc::clone(&pcm)));
    assert_eq!(cache.view().narration(&scene), Some(pcm));
}

#[test]
fn image_visual_loads_in_background() {
    let dir = temp_dir("store_image");
    let png = dir.join("a.png");
    write_png(&png, 4, 2);
    let mut cache = AssetCache::default();
    let scene = Scene::new(1, "x").with_visual(VisualRef::Image(png));
    cache.ensure_visual(&scene);
    assert!(cache.is_visual_pending(scene.id));
    assert!(cache.wait_for_visuals(&[scene.id], Duration::from_secs(10)));
    assert!(cache.is_visual_ready(scene.id));
    assert_eq!(cache.view().visual(scene.id).unwrap().size(), (4, 2));
}

#[test]
fn failed_visual_is_recorded_not_raised() {
    let mut cache = AssetCache::default();
    let scene = Scene::new(1, "x").with_visual(VisualRef::Image(PathBuf::from(
        "/definitely/missing/image.png",
    )));
    cache.ensure_visual(&scene);
    assert!(cache.wait_for_visuals(&[scene.id], Duration::from_secs(10)));
    assert!(!cache.is_visual_ready(scene.id));
    assert!(matches!(
        cache.visual_state(scene.id),
        Some(VisualState::Failed(_))
    ));
    assert!(cache.view().visual(scene.id).is_none());
}

#[test]
fn wait_times_out_on_pending_loads() {
    let mut cache = AssetCache::default();
    cache.visuals.insert(SceneId(5), VisualState::Loading);
    assert!(!cache.wait_for_visuals(&[SceneId(5)], Duration::from_millis(20)));
    // Scenes without a visual are never pending.
    assert!(cache.wait_for_visuals(&[SceneId(6)], Duration::from_millis(0)));
}

#[test]
fn watermark_and_bgm_failures_degrade() {
    let mut cache = AssetCache::default();
    cache.ensure_watermark(Path::new("/definitely/missing/wm.png"));
    cache.ensure_bgm(Path::new("/definitely/missing/music.mp3"));
    assert!(cache.view().watermark().is_none());
    assert!(cache.view().bgm().is_none());

    cache.set_bgm(AudioPcm {
        sample_rate: MIX_SAMPLE_RATE,
        channels: 2,
        interleaved_f32: vec![0.0; 4],
    });
    assert!(cache.view().bgm().is_some());
}
