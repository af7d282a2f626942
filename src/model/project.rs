use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::assets::decode::PcmFormat;
use crate::foundation::core::Canvas;
use crate::foundation::error::{ReelError, ReelResult};
use crate::model::scene::{NarrationAudio, Scene, SceneId, SceneStatus, VisualRef};
use crate::model::style::SubtitleStyle;

/// Output orientation of the project.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    /// 1080p canvas for this orientation; subtitle sizes are authored against its width.
    pub fn base_canvas(self) -> Canvas {
        match self {
            Self::Landscape => Canvas {
                width: 1920,
                height: 1080,
            },
            Self::Portrait => Canvas {
                width: 1080,
                height: 1920,
            },
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneDef {
    id: u64,
    #[serde(default)]
    voiceover: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    video: Option<String>,
    /// Raw s16le narration file.
    #[serde(default)]
    audio_path: Option<String>,
    #[serde(default)]
    audio_base64: Option<String>,
    #[serde(default)]
    duration_est: Option<f64>,
    #[serde(default)]
    status: SceneStatus,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BgmDef {
    path: String,
    #[serde(default = "default_bgm_volume")]
    volume: f64,
}

fn default_bgm_volume() -> f64 {
    0.2
}

fn default_speed() -> f64 {
    1.0
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectDef {
    scenes: Vec<SceneDef>,
    /// Kept as raw JSON so only the fields it names override a preset.
    #[serde(default)]
    subtitle_style: Option<serde_json::Value>,
    /// Named template; fields given in `subtitleStyle` are applied on top of it.
    #[serde(default)]
    subtitle_preset: Option<String>,
    #[serde(default)]
    bgm: Option<BgmDef>,
    #[serde(default)]
    aspect_ratio: AspectRatio,
    #[serde(default = "default_speed")]
    voice_speed: f64,
    #[serde(default)]
    is_pro: bool,
    #[serde(default)]
    hide_subtitles: bool,
    #[serde(default)]
    watermark: Option<String>,
    #[serde(default)]
    font: Option<String>,
    #[serde(default)]
    pcm: PcmFormat,
}

/// Preset (or the built-in style), then every field named in `overrides`.
fn resolve_style(
    preset: Option<&str>,
    overrides: Option<serde_json::Value>,
) -> ReelResult<SubtitleStyle> {
    let base = match preset {
        Some(name) => SubtitleStyle::preset(name).ok_or_else(|| {
            ReelError::validation(format!("unknown subtitle preset \"{name}\""))
        })?,
        None => SubtitleStyle::default(),
    };
    let fields = match overrides {
        None => return Ok(base),
        Some(serde_json::Value::Object(fields)) => fields,
        Some(other) => {
            return serde_json::from_value(other).map_err(|e| ReelError::serde(e.to_string()));
        }
    };
    let mut merged = match serde_json::to_value(&base) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(_) => return Err(ReelError::serde("subtitle style did not serialize to an object")),
        Err(e) => return Err(ReelError::serde(e.to_string())),
    };
    for (key, value) in fields {
        let key = if key == "animationMode" {
            "animation".to_owned()
        } else {
            key
        };
        merged.insert(key, value);
    }
    serde_json::from_value(serde_json::Value::Object(merged))
        .map_err(|e| ReelError::serde(e.to_string()))
}

/// Background music track configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct BgmConfig {
    pub path: PathBuf,
    /// Gain in `[0, 1]`, independent of narration.
    pub volume: f32,
}

/// A loaded project: scenes plus the rendering configuration that applies to all of them.
#[derive(Clone, Debug)]
pub struct Project {
    pub scenes: Vec<Scene>,
    pub style: SubtitleStyle,
    pub bgm: Option<BgmConfig>,
    pub aspect: AspectRatio,
    /// Narration playback rate (> 0).
    pub voice_speed: f64,
    pub subtitles_enabled: bool,
    pub watermark_required: bool,
    pub watermark_path: Option<PathBuf>,
    pub font_path: Option<PathBuf>,
    pub pcm: PcmFormat,
    /// Directory asset paths were resolved against.
    pub root: PathBuf,
}

impl Project {
    /// Load a project JSON file; relative asset paths resolve against its directory.
    pub fn from_path(path: &Path) -> ReelResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read project file '{}'", path.display()))?;
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::from_json_str(&text, &root)
    }

    pub fn from_json_str(json: &str, root: &Path) -> ReelResult<Self> {
        let def: ProjectDef =
            serde_json::from_str(json).map_err(|e| ReelError::serde(e.to_string()))?;
        Self::from_def(def, root)
    }

    fn from_def(def: ProjectDef, root: &Path) -> ReelResult<Self> {
        if !def.voice_speed.is_finite() || def.voice_speed <= 0.0 {
            return Err(ReelError::validation("voiceSpeed must be finite and > 0"));
        }
        let pcm = def.pcm.validate()?;

        let mut seen = std::collections::HashSet::new();
        let mut scenes = Vec::with_capacity(def.scenes.len());
        for sd in def.scenes {
            if !seen.insert(sd.id) {
                return Err(ReelError::validation(format!(
                    "duplicate scene id {}",
                    sd.id
                )));
            }
            scenes.push(scene_from_def(sd, root)?);
        }

        let style = resolve_style(def.subtitle_preset.as_deref(), def.subtitle_style)?;

        let bgm = match def.bgm {
            Some(b) => {
                if !b.volume.is_finite() {
                    return Err(ReelError::validation("bgm volume must be finite"));
                }
                Some(BgmConfig {
                    path: resolve(root, &b.path),
                    volume: b.volume.clamp(0.0, 1.0) as f32,
                })
            }
            None => None,
        };

        Ok(Self {
            scenes,
            style,
            bgm,
            aspect: def.aspect_ratio,
            voice_speed: def.voice_speed,
            subtitles_enabled: !def.hide_subtitles,
            watermark_required: !def.is_pro,
            watermark_path: def.watermark.map(|w| resolve(root, &w)),
            font_path: def.font.map(|f| resolve(root, &f)),
            pcm,
            root: root.to_path_buf(),
        })
    }

    pub fn scene(&self, id: SceneId) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.id == id)
    }
}

fn scene_from_def(sd: SceneDef, root: &Path) -> ReelResult<Scene> {
    let visual = match (sd.video, sd.image) {
        (Some(v), _) => Some(VisualRef::Video(resolve(root, &v))),
        (None, Some(i)) => Some(VisualRef::Image(resolve(root, &i))),
        (None, None) => None,
    };

    let narration = match (sd.audio_path, sd.audio_base64) {
        (Some(p), _) => {
            let path = resolve(root, &p);
            match std::fs::read(&path) {
                Ok(bytes) => Some(NarrationAudio::Pcm16(Arc::new(bytes))),
                Err(e) => {
                    tracing::warn!(
                        scene = sd.id,
                        path = %path.display(),
                        "narration file unreadable, using duration estimate: {e}"
                    );
                    None
                }
            }
        }
        (None, Some(b64)) => Some(NarrationAudio::Base64(b64)),
        (None, None) => None,
    };

    let mut scene = Scene::new(sd.id, sd.voiceover).with_status(sd.status);
    scene.visual = visual;
    scene.narration = narration;
    if let Some(est) = sd.duration_est {
        scene.duration_est = est;
    }
    Ok(scene)
}

fn resolve(root: &Path, p: &str) -> PathBuf {
    let path = Path::new(p);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/model/project.rs"]
mod tests;
