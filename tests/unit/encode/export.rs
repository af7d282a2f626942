use std::path::Path;
use std::sync::atomic::AtomicBool;

use super::*;
use crate::assets::media::AudioPcm;
use crate::encode::sink::{InMemorySink, SinkOutput};
use crate::render::backend::FrameRGBA;
use crate::render::compositor::CompositorOpts;
use crate::render::cpu::CpuBackend;

const TWO_SCENES: &str = r#"{
    "scenes": [
        { "id": 1, "voiceover": "hello there", "durationEst": 0.5 },
        { "id": 2, "voiceover": "goodbye", "durationEst": 0.25 }
    ],
    "isPro": true
}"#;

fn project(json: &str) -> Project {
    Project::from_json_str(json, Path::new(".")).unwrap()
}

fn compositor() -> Compositor<CpuBackend> {
    Compositor::with_backend(
        CompositorOpts::default().with_canvas(Canvas {
            width: 32,
            height: 18,
        }),
        CpuBackend::without_font(),
    )
}

fn exporter() -> Exporter {
    Exporter::new(
        RenderOptions::default()
            .with_resolution(Resolution::P360)
            .with_fps(10),
        ExportOpts::default(),
    )
}

struct RefusingSink;

impl FrameSink for RefusingSink {
    fn begin(&mut self, _config: &SinkConfig) -> ReelResult<()> {
        Err(ReelError::encoder_init("no usable codec"))
    }

    fn push_frame(&mut self, _frame: &FrameRGBA) -> ReelResult<()> {
        panic!("frame pushed after a failed begin");
    }

    fn finish(&mut self, _audio: &AudioPcm) -> ReelResult<SinkOutput> {
        panic!("finish called after a failed begin");
    }
}

#[test]
fn resolution_classes_map_to_canvases() {
    assert_eq!(
        Resolution::P720.canvas(AspectRatio::Landscape),
        Canvas {
            width: 1280,
            height: 720
        }
    );
    assert_eq!(
        Resolution::P1080.canvas(AspectRatio::Portrait),
        Canvas {
            width: 1080,
            height: 1920
        }
    );
    assert_eq!("4K".parse::<Resolution>().unwrap(), Resolution::P4k);
    assert_eq!("360".parse::<Resolution>().unwrap(), Resolution::P360);
    assert!("8k".parse::<Resolution>().is_err());
    assert_eq!(Resolution::default().to_string(), "1080p");
}

#[test]
fn default_render_options() {
    let opts = RenderOptions::default();
    assert_eq!(opts.resolution, Resolution::P1080);
    assert_eq!(opts.bitrate, 15_000_000);
    assert_eq!(opts.fps, 60);
}

#[test]
fn export_covers_the_timeline_and_restores_the_canvas() {
    let project = project(TWO_SCENES);
    let mut cache = AssetCache::new(project.pcm);
    let mut comp = compositor();
    let mut sink = InMemorySink::counting();

    let out = exporter()
        .run(
            &project,
            &mut cache,
            &mut comp,
            &mut sink,
            &AtomicBool::new(false),
            |_| {},
        )
        .unwrap();

    // 0.75 s at 10 fps.
    assert_eq!(out.frames, 8);
    assert_eq!(sink.frame_count(), 8);
    assert_eq!(out.duration_secs, 0.75);
    assert_eq!(out.extension, "mp4");

    let config = sink.config().unwrap();
    assert_eq!((config.width, config.height), (640, 360));
    assert_eq!(config.video_bitrate, 15_000_000);

    let audio = sink.audio().unwrap();
    assert_eq!(audio.channels, 2);
    assert!((audio.duration_secs() - 0.8).abs() < 1e-6);
    assert!((audio.duration_secs() - out.duration_secs).abs() <= 0.1);
    assert!(!sink.aborted());

    assert_eq!(
        comp.canvas(),
        Canvas {
            width: 32,
            height: 18
        }
    );
}

#[test]
fn portrait_projects_export_portrait_frames() {
    let project = project(
        r#"{ "scenes": [{ "id": 1, "durationEst": 0.2 }], "aspectRatio": "9:16", "isPro": true }"#,
    );
    let mut cache = AssetCache::new(project.pcm);
    let mut comp = compositor();
    let before = *comp.opts();
    let mut sink = InMemorySink::keeping_frames();
    exporter()
        .run(
            &project,
            &mut cache,
            &mut comp,
            &mut sink,
            &AtomicBool::new(false),
            |_| {},
        )
        .unwrap();
    let frame = &sink.frames()[0];
    assert_eq!((frame.width, frame.height), (360, 640));
    assert_eq!(*comp.opts(), before);
}

#[test]
fn progress_runs_from_preparing_to_done() {
    let project = project(TWO_SCENES);
    let mut cache = AssetCache::new(project.pcm);
    let mut comp = compositor();
    let mut sink = InMemorySink::counting();
    let mut seen = Vec::new();
    exporter()
        .run(
            &project,
            &mut cache,
            &mut comp,
            &mut sink,
            &AtomicBool::new(false),
            |p| seen.push(*p),
        )
        .unwrap();

    assert_eq!(seen.first().map(|p| p.stage), Some(ExportStage::Preparing));
    assert_eq!(seen.last().map(|p| p.stage), Some(ExportStage::Done));
    let rendering: Vec<_> = seen
        .iter()
        .filter(|p| p.stage == ExportStage::Rendering)
        .collect();
    assert_eq!(rendering.len(), 8);
    assert!(rendering.windows(2).all(|w| w[0].percent <= w[1].percent));
    assert_eq!(rendering.last().map(|p| p.current_frame), Some(8));
    assert!(rendering.iter().all(|p| p.total_frames == 8));
    assert!(seen.iter().any(|p| p.stage == ExportStage::Muxing));
}

#[test]
fn cancellation_stops_before_the_first_frame() {
    let project = project(TWO_SCENES);
    let mut cache = AssetCache::new(project.pcm);
    let mut comp = compositor();
    let mut sink = InMemorySink::counting();
    let err = exporter()
        .run(
            &project,
            &mut cache,
            &mut comp,
            &mut sink,
            &AtomicBool::new(true),
            |_| {},
        )
        .unwrap_err();
    assert!(matches!(err, ReelError::Cancelled));
    assert_eq!(sink.frame_count(), 0);
    assert!(sink.aborted());
    assert_eq!(comp.canvas().width, 32);
}

#[test]
fn cancellation_mid_run_aborts_the_sink() {
    let project = project(TWO_SCENES);
    let mut cache = AssetCache::new(project.pcm);
    let mut comp = compositor();
    let mut sink = InMemorySink::counting();
    let cancel = AtomicBool::new(false);
    let err = exporter()
        .run(&project, &mut cache, &mut comp, &mut sink, &cancel, |p| {
            if p.current_frame >= 3 {
                cancel.store(true, std::sync::atomic::Ordering::Relaxed);
            }
        })
        .unwrap_err();
    assert!(matches!(err, ReelError::Cancelled));
    assert_eq!(sink.frame_count(), 3);
    assert!(sink.aborted());
    assert!(sink.audio().is_none());
}

#[test]
fn wall_time_limit_fails_with_a_timeout() {
    let project = project(TWO_SCENES);
    let mut cache = AssetCache::new(project.pcm);
    let mut comp = compositor();
    let mut sink = InMemorySink::counting();
    let exporter = Exporter::new(
        RenderOptions::default()
            .with_resolution(Resolution::P360)
            .with_fps(10),
        ExportOpts::default().with_max_wall_time(Duration::ZERO),
    );
    let err = exporter
        .run(
            &project,
            &mut cache,
            &mut comp,
            &mut sink,
            &AtomicBool::new(false),
            |_| {},
        )
        .unwrap_err();
    match err {
        ReelError::EncodeTimeout {
            frames_done,
            frames_total,
            ..
        } => {
            assert_eq!(frames_done, 0);
            assert_eq!(frames_total, 8);
        }
        other => panic!("expected a timeout, got {other:?}"),
    }
    assert!(sink.aborted());
}

#[test]
fn encoder_init_failure_happens_before_rendering() {
    let project = project(TWO_SCENES);
    let mut cache = AssetCache::new(project.pcm);
    let mut comp = compositor();
    let err = exporter()
        .run(
            &project,
            &mut cache,
            &mut comp,
            &mut RefusingSink,
            &AtomicBool::new(false),
            |_| {},
        )
        .unwrap_err();
    assert!(matches!(err, ReelError::EncoderInit(_)));
    assert_eq!(comp.canvas().height, 18);
}

#[test]
fn project_without_completed_scenes_is_rejected() {
    let project = project(r#"{ "scenes": [{ "id": 1, "status": "failed" }] }"#);
    let mut cache = AssetCache::new(project.pcm);
    let mut comp = compositor();
    let mut sink = InMemorySink::counting();
    let err = exporter()
        .run(
            &project,
            &mut cache,
            &mut comp,
            &mut sink,
            &AtomicBool::new(false),
            |_| {},
        )
        .unwrap_err();
    assert!(matches!(err, ReelError::Validation(_)));
    assert!(sink.config().is_none());
}

#[test]
fn zero_fps_is_rejected() {
    let project = project(TWO_SCENES);
    let mut cache = AssetCache::new(project.pcm);
    let mut comp = compositor();
    let mut sink = InMemorySink::counting();
    let err = Exporter::new(RenderOptions::default().with_fps(0), ExportOpts::default())
        .run(
            &project,
            &mut cache,
            &mut comp,
            &mut sink,
            &AtomicBool::new(false),
            |_| {},
        )
        .unwrap_err();
    assert!(matches!(err, ReelError::Validation(_)));
}
