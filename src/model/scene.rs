use std::path::PathBuf;
use std::sync::Arc;

use crate::assets::media::AudioPcm;

/// Narration length assumed for a scene without decodable audio or a usable estimate.
pub const FALLBACK_SCENE_SECS: f64 = 5.0;

/// Stable identifier of a scene, unique within a project.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct SceneId(pub u64);

impl std::fmt::Display for SceneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scene#{}", self.0)
    }
}

/// Production status set by the upstream generator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneStatus {
    Pending,
    Generating,
    #[default]
    Completed,
    Failed,
    Skipped,
}

/// Reference to a scene's visual asset on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VisualRef {
    Image(PathBuf),
    Video(PathBuf),
}

impl VisualRef {
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Image(p) | Self::Video(p) => p,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Self::Video(_))
    }
}

/// Narration audio as delivered by the producer.
#[derive(Clone, Debug)]
pub enum NarrationAudio {
    /// Raw signed 16-bit little-endian PCM.
    Pcm16(Arc<Vec<u8>>),
    /// The same PCM, base64-encoded.
    Base64(String),
    /// Already decoded buffer, adopted as-is.
    Buffer(Arc<AudioPcm>),
}

/// One narrated unit of the video.
#[derive(Clone, Debug)]
pub struct Scene {
    pub id: SceneId,
    pub voiceover: String,
    pub visual: Option<VisualRef>,
    pub narration: Option<NarrationAudio>,
    /// Producer's duration estimate in seconds; used when no narration decodes.
    pub duration_est: f64,
    pub status: SceneStatus,
}

impl Scene {
    pub fn new(id: u64, voiceover: impl Into<String>) -> Self {
        Self {
            id: SceneId(id),
            voiceover: voiceover.into(),
            visual: None,
            narration: None,
            duration_est: FALLBACK_SCENE_SECS,
            status: SceneStatus::Completed,
        }
    }

    pub fn with_visual(mut self, visual: VisualRef) -> Self {
        self.visual = Some(visual);
        self
    }

    pub fn with_narration(mut self, narration: NarrationAudio) -> Self {
        self.narration = Some(narration);
        self
    }

    pub fn with_duration_est(mut self, secs: f64) -> Self {
        self.duration_est = secs;
        self
    }

    pub fn with_status(mut self, status: SceneStatus) -> Self {
        self.status = status;
        self
    }

    /// Only completed scenes take part in playback and export.
    pub fn is_active(&self) -> bool {
        self.status == SceneStatus::Completed
    }

    /// Duration estimate with the 5 s fallback applied to missing or non-positive values.
    pub fn estimated_secs(&self) -> f64 {
        if self.duration_est.is_finite() && self.duration_est > 0.0 {
            self.duration_est
        } else {
            FALLBACK_SCENE_SECS
        }
    }
}

/// Iterate the scenes that enter the timeline, in order.
pub fn active_scenes(scenes: &[Scene]) -> impl Iterator<Item = &Scene> {
    scenes.iter().filter(|s| s.is_active())
}

#[cfg(test)]
#[path = "../../tests/unit/model/scene.rs"]
mod tests;
