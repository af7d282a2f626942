use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::assets::decode::{
    PcmFormat, PreparedImage, decode_base64_payload, decode_pcm16le, read_image_file,
};
use crate::assets::media::{
    AudioPcm, MIX_SAMPLE_RATE, VideoSourceInfo, decode_audio_f32_stereo, probe_video,
};
use crate::foundation::error::{ReelError, ReelResult};
use crate::model::scene::{NarrationAudio, Scene, SceneId, VisualRef};

/// A decoded visual ready for compositing.
#[derive(Clone, Debug)]
pub enum VisualAsset {
    Image(PreparedImage),
    /// Probed video; frames are decoded on demand by the rasterizer.
    Video(Arc<VideoSourceInfo>),
}

impl VisualAsset {
    pub fn size(&self) -> (u32, u32) {
        match self {
            Self::Image(img) => (img.width, img.height),
            Self::Video(info) => (info.width, info.height),
        }
    }
}

/// Load state of one scene's visual.
#[derive(Clone, Debug)]
pub enum VisualState {
    Loading,
    Ready(VisualAsset),
    /// The scene renders background only.
    Failed(String),
}

const PAYLOAD_SEED: u64 = 0x5f0d_3c1a_9e27_b846;

/// Identity of a narration payload. A scene whose payload changes is decoded again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PayloadKey {
    Pcm16 { len: usize, hash: u64 },
    Base64 { len: usize, hash: u64 },
    /// Address of the attached buffer.
    Buffer(usize),
}

impl PayloadKey {
    fn of(audio: &NarrationAudio) -> Self {
        match audio {
            NarrationAudio::Pcm16(bytes) => Self::Pcm16 {
                len: bytes.len(),
                hash: xxh3_64_with_seed(bytes, PAYLOAD_SEED),
            },
            NarrationAudio::Base64(text) => Self::Base64 {
                len: text.len(),
                hash: xxh3_64_with_seed(text.as_bytes(), PAYLOAD_SEED),
            },
            NarrationAudio::Buffer(buf) => Self::Buffer(Arc::as_ptr(buf).addr()),
        }
    }
}

/// Decode outcome for one payload; `None` when it was unusable.
struct NarrationEntry {
    key: PayloadKey,
    pcm: Option<Arc<AudioPcm>>,
}

struct LoadResult {
    scene: SceneId,
    outcome: ReelResult<VisualAsset>,
}

/// Per-project cache of decoded narration, visuals, background music and watermark.
///
/// Visual entries are additive: nothing is evicted when scenes change. Narration entries are
/// keyed on the payload, so new bytes for a scene replace its old buffer. Visual loads run on
/// the rayon pool and land in the cache only when [`AssetCache::poll`] is called, which callers
/// do between ticks so that a frame always sees a stable [`AssetView`].
pub struct AssetCache {
    pcm: PcmFormat,
    narration: HashMap<SceneId, NarrationEntry>,
    visuals: HashMap<SceneId, VisualState>,
    tx: mpsc::Sender<LoadResult>,
    rx: mpsc::Receiver<LoadResult>,
    bgm: Option<Arc<AudioPcm>>,
    watermark: Option<PreparedImage>,
}

impl AssetCache {
    pub fn new(pcm: PcmFormat) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            pcm,
            narration: HashMap::new(),
            visuals: HashMap::new(),
            tx,
            rx,
            bgm: None,
            watermark: None,
        }
    }

    /// Decode the scene's narration unless this exact payload was already decoded. An
    /// undecodable payload is remembered as "no buffer" so the timeline falls back to the
    /// scene's estimate; replacing the payload triggers a fresh decode.
    pub fn ensure_decoded(&mut self, scene: &Scene) {
        let Some(audio) = &scene.narration else {
            self.narration.remove(&scene.id);
            return;
        };
        let key = PayloadKey::of(audio);
        if self.narration.get(&scene.id).is_some_and(|e| e.key == key) {
            return;
        }
        let decoded = match audio {
            NarrationAudio::Buffer(buf) if buf.is_empty() => {
                Err(ReelError::asset_decode("attached narration buffer is empty"))
            }
            NarrationAudio::Buffer(buf) => Ok(Arc::clone(buf)),
            NarrationAudio::Pcm16(bytes) => decode_pcm16le(bytes, self.pcm).map(Arc::new),
            NarrationAudio::Base64(payload) => decode_base64_payload(payload)
                .and_then(|bytes| decode_pcm16le(&bytes, self.pcm))
                .map(Arc::new),
        };
        let pcm = match decoded {
            Ok(buf) => {
                tracing::debug!(scene = %scene.id, secs = buf.duration_secs(), "narration decoded");
                Some(buf)
            }
            Err(e) => {
                tracing::warn!(scene = %scene.id, "narration unusable, using duration estimate: {e}");
                None
            }
        };
        self.narration.insert(scene.id, NarrationEntry { key, pcm });
    }

    /// Start loading the scene's visual in the background if not already requested.
    pub fn ensure_visual(&mut self, scene: &Scene) {
        let Some(visual) = scene.visual.clone() else {
            return;
        };
        if self.visuals.contains_key(&scene.id) {
            return;
        }
        self.visuals.insert(scene.id, VisualState::Loading);
        let tx = self.tx.clone();
        let id = scene.id;
        rayon::spawn(move || {
            let outcome = load_visual(&visual);
            // The receiver disappears only when the cache is dropped.
            let _ = tx.send(LoadResult { scene: id, outcome });
        });
    }

    /// Decode narration and request visuals for every scene.
    pub fn prepare(&mut self, scenes: &[Scene]) {
        for scene in scenes {
            self.ensure_decoded(scene);
            self.ensure_visual(scene);
        }
    }

    /// Drain finished background loads into the cache. Returns how many landed.
    pub fn poll(&mut self) -> usize {
        let mut landed = 0;
        while let Ok(LoadResult { scene, outcome }) = self.rx.try_recv() {
            let state = match outcome {
                Ok(asset) => {
                    tracing::debug!(scene = %scene, "visual ready");
                    VisualState::Ready(asset)
                }
                Err(e) => {
                    tracing::warn!(scene = %scene, "visual failed to load: {e}");
                    VisualState::Failed(e.to_string())
                }
            };
            if matches!(self.visuals.get(&scene), Some(VisualState::Ready(_))) {
                continue;
            }
            self.visuals.insert(scene, state);
            landed += 1;
        }
        landed
    }

    /// Wait until none of `ids` is still loading, or `timeout` elapses. Returns `true` when
    /// every visual resolved (ready or failed).
    pub fn wait_for_visuals(&mut self, ids: &[SceneId], timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.poll();
            if ids.iter().all(|id| !self.is_visual_pending(*id)) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep((deadline - now).min(Duration::from_millis(10)));
        }
    }

    /// Insert an already-prepared visual.
    pub fn insert_visual(&mut self, scene: SceneId, asset: VisualAsset) {
        self.visuals.insert(scene, VisualState::Ready(asset));
    }

    pub fn is_visual_ready(&self, scene: SceneId) -> bool {
        matches!(self.visuals.get(&scene), Some(VisualState::Ready(_)))
    }

    pub fn is_visual_pending(&self, scene: SceneId) -> bool {
        matches!(self.visuals.get(&scene), Some(VisualState::Loading))
    }

    pub fn visual_state(&self, scene: SceneId) -> Option<&VisualState> {
        self.visuals.get(&scene)
    }

    pub fn is_audio_ready(&self, scene: SceneId) -> bool {
        self.narration.get(&scene).is_some_and(|e| e.pcm.is_some())
    }

    /// Decode background music at the mixer rate. Failures leave the project without BGM.
    pub fn ensure_bgm(&mut self, path: &Path) {
        if self.bgm.is_some() {
            return;
        }
        match decode_audio_f32_stereo(path, MIX_SAMPLE_RATE) {
            Ok(pcm) if !pcm.is_empty() => self.bgm = Some(Arc::new(pcm)),
            Ok(_) => tracing::warn!(path = %path.display(), "background music has no samples"),
            Err(e) => tracing::warn!(path = %path.display(), "background music unavailable: {e}"),
        }
    }

    pub fn set_bgm(&mut self, pcm: AudioPcm) {
        self.bgm = (!pcm.is_empty()).then(|| Arc::new(pcm));
    }

    pub fn ensure_watermark(&mut self, path: &Path) {
        if self.watermark.is_some() {
            return;
        }
        match read_image_file(path) {
            Ok(img) => self.watermark = Some(img),
            Err(e) => tracing::warn!(path = %path.display(), "watermark unavailable: {e}"),
        }
    }

    pub fn set_watermark(&mut self, img: PreparedImage) {
        self.watermark = Some(img);
    }

    /// Immutable snapshot for one tick.
    pub fn view(&self) -> AssetView<'_> {
        AssetView { cache: self }
    }
}

impl Default for AssetCache {
    fn default() -> Self {
        Self::new(PcmFormat::default())
    }
}

/// Read-only view of the cache used while composing a frame or building a session.
#[derive(Clone, Copy)]
pub struct AssetView<'a> {
    cache: &'a AssetCache,
}

impl<'a> AssetView<'a> {
    pub fn visual(&self, scene: SceneId) -> Option<&'a VisualAsset> {
        match self.cache.visuals.get(&scene) {
            Some(VisualState::Ready(asset)) => Some(asset),
            _ => None,
        }
    }

    /// Decoded narration; a buffer attached to the scene itself wins over the cache.
    pub fn narration(&self, scene: &Scene) -> Option<Arc<AudioPcm>> {
        if let Some(NarrationAudio::Buffer(buf)) = &scene.narration
            && !buf.is_empty()
        {
            return Some(Arc::clone(buf));
        }
        self.cache
            .narration
            .get(&scene.id)
            .and_then(|e| e.pcm.clone())
    }

    pub fn bgm(&self) -> Option<Arc<AudioPcm>> {
        self.cache.bgm.clone()
    }

    pub fn watermark(&self) -> Option<&'a PreparedImage> {
        self.cache.watermark.as_ref()
    }
}

fn load_visual(visual: &VisualRef) -> ReelResult<VisualAsset> {
    match visual {
        VisualRef::Image(path) => read_image_file(path).map(VisualAsset::Image),
        VisualRef::Video(path) => {
            let abs = absolutize(path);
            probe_video(&abs).map(|info| VisualAsset::Video(Arc::new(info)))
        }
    }
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
#[path = "../../tests/unit/assets/store.rs"]
mod tests;
