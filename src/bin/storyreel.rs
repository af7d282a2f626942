use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use storyreel::{
    AssetCache, Compositor, CompositorOpts, ContainerFormat, ContextFactory, CpuBackend,
    CpuBackendOpts, ExportOpts, ExportStage, Exporter, FfmpegSink, FfmpegSinkOpts, FrameContext,
    GraphInputs, PlaybackController, PlaybackState, PlayerEvent, Project, RenderOptions,
    Resolution, Timeline, build_timeline, format_duration, format_time,
};

const LOG_ENV: &str = "STORYREEL_LOG";

#[derive(Parser, Debug)]
#[command(name = "storyreel", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the scene timeline derived from the project.
    Timeline(TimelineArgs),
    /// Render the frame at one timeline position as a PNG.
    Frame(FrameArgs),
    /// Export the whole timeline to a video file (requires `ffmpeg` on PATH).
    Export(ExportArgs),
    /// Play the timeline in real time, printing position updates.
    Play(PlayArgs),
}

#[derive(Parser, Debug)]
struct TimelineArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Print spans as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Timeline position in seconds.
    #[arg(long, default_value_t = 0.0)]
    at: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[arg(long, default_value_t = Resolution::P720)]
    resolution: Resolution,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output path; the extension follows the negotiated container.
    #[arg(long)]
    out: PathBuf,

    #[arg(long, default_value_t = Resolution::P1080)]
    resolution: Resolution,

    #[arg(long, default_value_t = storyreel::encode::export::DEFAULT_EXPORT_FPS)]
    fps: u32,

    /// Video bitrate in bits per second.
    #[arg(long, default_value_t = storyreel::encode::export::DEFAULT_VIDEO_BITRATE)]
    bitrate: u32,

    /// Container to try first before falling back.
    #[arg(long, value_enum)]
    container: Option<ContainerChoice>,

    /// Fail if the export takes longer than this many seconds.
    #[arg(long)]
    max_wall_secs: Option<u64>,

    /// Keep the video-only stream and raw audio next to the output.
    #[arg(long)]
    keep_intermediate: bool,
}

#[derive(Parser, Debug)]
struct PlayArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Start position in seconds.
    #[arg(long, default_value_t = 0.0)]
    from: f64,

    /// Do not open an audio device; follow the wall clock instead.
    #[arg(long)]
    silent: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ContainerChoice {
    Mp4,
    Webm,
    WebmVp8,
}

impl From<ContainerChoice> for ContainerFormat {
    fn from(c: ContainerChoice) -> Self {
        match c {
            ContainerChoice::Mp4 => ContainerFormat::Mp4H264Aac,
            ContainerChoice::Webm => ContainerFormat::WebmVp9Opus,
            ContainerChoice::WebmVp8 => ContainerFormat::WebmVp8Vorbis,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Timeline(args) => cmd_timeline(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Export(args) => cmd_export(args),
        Command::Play(args) => cmd_play(args),
    }
}

fn load_project(path: &Path) -> anyhow::Result<Project> {
    Project::from_path(path).with_context(|| format!("load project '{}'", path.display()))
}

/// Decode narration, start visual loads and wait briefly for them.
fn warm_cache(project: &Project) -> AssetCache {
    let mut cache = AssetCache::new(project.pcm);
    cache.prepare(&project.scenes);
    if let Some(bgm) = &project.bgm {
        cache.ensure_bgm(&bgm.path);
    }
    if project.watermark_required {
        if let Some(path) = &project.watermark_path {
            cache.ensure_watermark(path);
        }
    }
    let ids: Vec<_> = project.scenes.iter().map(|s| s.id).collect();
    if !cache.wait_for_visuals(&ids, storyreel::encode::export::DEFAULT_ASSET_WAIT) {
        tracing::warn!("some visuals are still loading");
    }
    cache
}

fn make_compositor(project: &Project, resolution: Resolution) -> Compositor<CpuBackend> {
    Compositor::with_backend(
        CompositorOpts::for_aspect(project.aspect)
            .with_canvas(resolution.canvas(project.aspect)),
        CpuBackend::new(CpuBackendOpts {
            font_path: project.font_path.clone(),
            font_family: Some(project.style.font_family.clone()),
        }),
    )
}

fn project_timeline(project: &Project, cache: &AssetCache) -> anyhow::Result<Timeline> {
    Ok(build_timeline(
        &project.scenes,
        &cache.view(),
        project.voice_speed,
    )?)
}

fn cmd_timeline(args: TimelineArgs) -> anyhow::Result<()> {
    let project = load_project(&args.in_path)?;
    let cache = warm_cache(&project);
    let timeline = project_timeline(&project, &cache)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&timeline)?);
        return Ok(());
    }
    for span in timeline.spans() {
        println!(
            "scene {:>4}  {:>8.3}s .. {:>8.3}s  ({:.3}s)",
            span.scene.0,
            span.start,
            span.end,
            span.duration()
        );
    }
    println!("total {}", format_time(timeline.total()));
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let project = load_project(&args.in_path)?;
    let cache = warm_cache(&project);
    let timeline = project_timeline(&project, &cache)?;
    let mut compositor = make_compositor(&project, args.resolution);

    let frame_ctx = FrameContext::for_project(&project, &timeline, cache.view());
    let outcome = compositor.render_frame(&frame_ctx.at(args.at, 0.0, false))?;
    outcome.frame.save_png(&args.out)?;
    println!(
        "wrote {} ({}x{}, scene {:?}, progress {:.3})",
        args.out.display(),
        outcome.frame.width,
        outcome.frame.height,
        outcome.scene_index,
        outcome.progress
    );
    Ok(())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let project = load_project(&args.in_path)?;
    let mut cache = AssetCache::new(project.pcm);
    // Preview canvas; the exporter switches to the export size for the run.
    let mut compositor = make_compositor(&project, Resolution::P360);

    let render = RenderOptions::default()
        .with_resolution(args.resolution)
        .with_fps(args.fps)
        .with_bitrate(args.bitrate);
    let mut opts = ExportOpts::default();
    if let Some(secs) = args.max_wall_secs {
        opts = opts.with_max_wall_time(Duration::from_secs(secs));
    }

    let mut sink_opts = FfmpegSinkOpts::new(&args.out);
    if let Some(c) = args.container {
        sink_opts = sink_opts.with_preferred(c.into());
    }
    sink_opts.keep_intermediate = args.keep_intermediate;
    let mut sink = FfmpegSink::new(sink_opts);

    let started = Instant::now();
    let mut last_percent = -1.0;
    let out = Exporter::new(render, opts).run(
        &project,
        &mut cache,
        &mut compositor,
        &mut sink,
        &AtomicBool::new(false),
        |p| {
            let step = (p.percent / 5.0).floor() * 5.0;
            if p.stage != ExportStage::Rendering || step > last_percent {
                last_percent = step;
                let eta = p
                    .eta_secs
                    .map(|s| format!(", eta {}", format_duration(s)))
                    .unwrap_or_default();
                eprintln!(
                    "{:?}: {:>5.1}% ({}/{} frames{eta})",
                    p.stage, p.percent, p.current_frame, p.total_frames
                );
            }
        },
    )?;

    println!(
        "wrote {} ({}, {} frames, {} of video in {})",
        out.path.display(),
        out.container,
        out.frames,
        format_time(out.duration_secs),
        format_duration(started.elapsed().as_secs_f64())
    );
    Ok(())
}

fn cmd_play(args: PlayArgs) -> anyhow::Result<()> {
    #[cfg(feature = "device-audio")]
    {
        if !args.silent {
            return play_with(storyreel::audio::device::DeviceFactory, &args);
        }
    }
    if !args.silent {
        tracing::info!("built without device-audio; playing silently");
    }
    play_with(storyreel::SystemFactory, &args)
}

fn play_with<F: ContextFactory>(factory: F, args: &PlayArgs) -> anyhow::Result<()> {
    let project = load_project(&args.in_path)?;
    let cache = warm_cache(&project);
    let timeline = project_timeline(&project, &cache)?;
    let mut compositor = make_compositor(&project, Resolution::P360);

    let bgm_volume = project.bgm.as_ref().map_or(0.0, |b| b.volume);
    let inputs = GraphInputs::collect(
        &timeline,
        &project.scenes,
        &cache.view(),
        project.voice_speed,
        bgm_volume,
    );
    let mut controller = PlaybackController::new(factory, inputs);
    controller.seek_and_play(args.from)?;

    let frame_ctx = FrameContext::for_project(&project, &timeline, cache.view());
    let frame_interval = Duration::from_secs_f64(1.0 / 60.0);
    let total = format_time(timeline.total());
    loop {
        let tick_start = Instant::now();
        let outcome = controller.tick(&mut compositor, &frame_ctx)?;
        for event in controller.drain_events() {
            match event {
                PlayerEvent::TimeUpdate(t) => println!("{} / {total}", format_time(t)),
                PlayerEvent::PlaybackChanged(state) => println!("{state:?}"),
            }
        }
        if outcome.finished && controller.state() == PlaybackState::Stopped {
            break;
        }
        if let Some(rest) = frame_interval.checked_sub(tick_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }
    Ok(())
}
