use std::collections::HashSet;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use anyhow::Context as _;

use crate::assets::media::AudioPcm;
use crate::audio::mix::write_mix_to_f32le_file;
use crate::encode::sink::{ContainerFormat, FrameSink, SinkConfig, SinkOutput};
use crate::foundation::error::{ReelError, ReelResult};
use crate::render::backend::FrameRGBA;

/// `(video encoder, audio encoder)` ffmpeg needs for a container.
pub fn encoders_for(container: ContainerFormat) -> (&'static str, &'static str) {
    match container {
        ContainerFormat::Mp4H264Aac => ("libx264", "aac"),
        ContainerFormat::WebmVp9Opus => ("libvpx-vp9", "libopus"),
        ContainerFormat::WebmVp8Vorbis => ("libvpx", "libvorbis"),
    }
}

/// Encoder names from `ffmpeg -encoders` output.
pub fn parse_encoder_list(text: &str) -> HashSet<String> {
    let mut names = HashSet::new();
    let mut in_table = false;
    for line in text.lines() {
        let trimmed = line.trim_start();
        if !in_table {
            if trimmed.starts_with("------") {
                in_table = true;
            }
            continue;
        }
        let mut cols = trimmed.split_whitespace();
        let (Some(flags), Some(name)) = (cols.next(), cols.next()) else {
            continue;
        };
        if flags.len() == 6 && matches!(flags.as_bytes()[0], b'V' | b'A' | b'S') {
            names.insert(name.to_owned());
        }
    }
    names
}

/// First container whose encoders are all available, trying `preferred` first.
pub fn negotiate_container(
    available: &HashSet<String>,
    preferred: Option<ContainerFormat>,
) -> Option<ContainerFormat> {
    preferred
        .into_iter()
        .chain(ContainerFormat::PREFERENCE)
        .find(|&c| {
            let (v, a) = encoders_for(c);
            available.contains(v) && available.contains(a)
        })
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn query_encoders() -> ReelResult<HashSet<String>> {
    let out = Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .output()
        .map_err(|e| ReelError::encoder_init(format!("failed to run ffmpeg -encoders: {e}")))?;
    if !out.status.success() {
        return Err(ReelError::encoder_init(format!(
            "ffmpeg -encoders exited with status {}",
            out.status
        )));
    }
    Ok(parse_encoder_list(&String::from_utf8_lossy(&out.stdout)))
}

pub fn ensure_parent_dir(path: &Path) -> ReelResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    /// Requested output path; its extension is replaced to match the negotiated container.
    pub out_path: PathBuf,
    pub preferred: Option<ContainerFormat>,
    pub overwrite: bool,
    /// Keep the video-only stream and raw audio next to the output.
    pub keep_intermediate: bool,
}

impl FfmpegSinkOpts {
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            preferred: None,
            overwrite: true,
            keep_intermediate: false,
        }
    }

    pub fn with_preferred(mut self, container: ContainerFormat) -> Self {
        self.preferred = Some(container);
        self
    }
}

struct Running {
    config: SinkConfig,
    container: ContainerFormat,
    out_path: PathBuf,
    video_path: PathBuf,
    child: Child,
    stdin: Option<ChildStdin>,
    scratch: Vec<u8>,
}

/// Pipes raw RGBA frames into a system `ffmpeg`, then muxes the captured audio on finish.
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,
    running: Option<Running>,
}

impl FfmpegSink {
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        Self {
            opts,
            running: None,
        }
    }

    pub fn container(&self) -> Option<ContainerFormat> {
        self.running.as_ref().map(|r| r.container)
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, config: &SinkConfig) -> ReelResult<()> {
        config.validate()?;
        if !is_ffmpeg_on_path() {
            return Err(ReelError::encoder_init(
                "ffmpeg is required for export, but was not found on PATH",
            ));
        }
        let available = query_encoders()?;
        let container = negotiate_container(&available, self.opts.preferred).ok_or_else(|| {
            ReelError::encoder_init("ffmpeg offers none of h264/aac, vp9/opus or vp8/vorbis")
        })?;

        let out_path = self.opts.out_path.with_extension(container.extension());
        ensure_parent_dir(&out_path)?;
        if !self.opts.overwrite && out_path.exists() {
            return Err(ReelError::encoder_init(format!(
                "output file '{}' already exists",
                out_path.display()
            )));
        }
        let video_path = intermediate_path(&out_path, "video", container.extension());

        let (video_codec, _) = encoders_for(container);
        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", config.width, config.height),
            "-r",
            &config.fps.to_string(),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            video_codec,
            "-pix_fmt",
            "yuv420p",
            "-b:v",
            &config.video_bitrate.to_string(),
        ])
        .arg(&video_path);

        let mut child = cmd.spawn().map_err(|e| {
            ReelError::encoder_init(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ReelError::encoder_init("failed to open ffmpeg stdin"))?;

        tracing::info!(
            container = %container,
            path = %out_path.display(),
            width = config.width,
            height = config.height,
            fps = config.fps,
            "encoder started"
        );
        self.running = Some(Running {
            scratch: vec![0u8; config.frame_len()],
            config: config.clone(),
            container,
            out_path,
            video_path,
            child,
            stdin: Some(stdin),
        });
        Ok(())
    }

    fn push_frame(&mut self, frame: &FrameRGBA) -> ReelResult<()> {
        let run = self
            .running
            .as_mut()
            .ok_or_else(|| ReelError::encode("ffmpeg sink received a frame before begin"))?;
        if frame.width != run.config.width || frame.height != run.config.height {
            return Err(ReelError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, run.config.width, run.config.height
            )));
        }
        flatten_to_opaque_rgba8(&mut run.scratch, &frame.data, frame.premultiplied)?;

        let stdin = run
            .stdin
            .as_mut()
            .ok_or_else(|| ReelError::encode("ffmpeg encoder is already finalized"))?;
        stdin
            .write_all(&run.scratch)
            .map_err(|e| ReelError::encode(format!("failed to write frame to ffmpeg stdin: {e}")))
    }

    fn finish(&mut self, audio: &AudioPcm) -> ReelResult<SinkOutput> {
        let Running {
            container,
            out_path,
            video_path,
            child,
            stdin,
            ..
        } = self
            .running
            .take()
            .ok_or_else(|| ReelError::encode("ffmpeg sink finished before begin"))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .map_err(|e| ReelError::encode(format!("failed to wait for ffmpeg to finish: {e}")))?;
        if !output.status.success() {
            let _ = std::fs::remove_file(&video_path);
            return Err(ReelError::encode(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let audio_path = intermediate_path(&out_path, "audio", "f32");
        let muxed = if audio.is_empty() {
            std::fs::rename(&video_path, &out_path)
                .map_err(|e| ReelError::encode(format!("failed to move video stream: {e}")))
        } else {
            write_mix_to_f32le_file(&audio.interleaved_f32, &audio_path).and_then(|()| {
                mux(container, &video_path, audio, &audio_path, &out_path)
            })
        };

        if !self.opts.keep_intermediate {
            let _ = std::fs::remove_file(&video_path);
            let _ = std::fs::remove_file(&audio_path);
        }
        muxed?;

        tracing::info!(path = %out_path.display(), "export written");
        Ok(SinkOutput {
            path: out_path,
            container,
        })
    }

    fn abort(&mut self) {
        let Some(mut run) = self.running.take() else {
            return;
        };
        // Kill before closing stdin, or ffmpeg finalizes a partial stream.
        if let Err(e) = run.child.kill() {
            tracing::debug!(error = %e, "ffmpeg already exited");
        }
        let _ = run.child.wait();
        drop(run.stdin.take());
        let _ = std::fs::remove_file(&run.video_path);
        tracing::info!(path = %run.out_path.display(), "encoder aborted");
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Copy the video stream and encode the captured audio next to it.
fn mux(
    container: ContainerFormat,
    video_path: &Path,
    audio: &AudioPcm,
    audio_path: &Path,
    out_path: &Path,
) -> ReelResult<()> {
    let (_, audio_codec) = encoders_for(container);
    let mut cmd = Command::new("ffmpeg");
    cmd.stdout(Stdio::null()).stderr(Stdio::piped());
    cmd.args(["-y", "-loglevel", "error", "-i"])
        .arg(video_path)
        .args([
            "-f",
            "f32le",
            "-ar",
            &audio.sample_rate.to_string(),
            "-ac",
            &audio.channels.to_string(),
            "-i",
        ])
        .arg(audio_path)
        .args([
            "-map", "0:v:0", "-map", "1:a:0", "-c:v", "copy", "-c:a", audio_codec, "-shortest",
        ]);
    if container == ContainerFormat::Mp4H264Aac {
        cmd.args(["-movflags", "+faststart"]);
    }
    cmd.arg(out_path);

    let out = cmd
        .output()
        .map_err(|e| ReelError::encode(format!("failed to run ffmpeg mux: {e}")))?;
    if !out.status.success() {
        return Err(ReelError::encode(format!(
            "ffmpeg mux exited with status {}: {}",
            out.status,
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    Ok(())
}

/// `out.mp4` -> `out.video.mp4`
fn intermediate_path(out_path: &Path, tag: &str, ext: &str) -> PathBuf {
    let stem = out_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "export".to_owned());
    out_path.with_file_name(format!("{stem}.{tag}.{ext}"))
}

/// Composite premultiplied (or straight) RGBA over black into opaque RGBA.
fn flatten_to_opaque_rgba8(dst: &mut [u8], src: &[u8], src_is_premul: bool) -> ReelResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(ReelError::validation(
            "flatten_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        if s[3] == 255 || src_is_premul {
            d[..3].copy_from_slice(&s[..3]);
        } else {
            let a = u16::from(s[3]);
            for c in 0..3 {
                d[c] = crate::foundation::math::mul_div255_u8(u16::from(s[c]), a);
            }
        }
        d[3] = 255;
    }
    Ok(())
}
