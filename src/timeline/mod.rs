//! Scene timeline: contiguous spans derived from narration durations.

use serde::Serialize;

use crate::assets::media::AudioPcm;
use crate::assets::store::AssetView;
use crate::foundation::error::{ReelError, ReelResult};
use crate::model::scene::{Scene, SceneId, active_scenes};

/// Half-open interval `[start, end)` of the master clock occupied by one scene.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TimelineSpan {
    pub scene: SceneId,
    pub start: f64,
    pub end: f64,
}

impl TimelineSpan {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t < self.end
    }
}

/// Result of resolving a clock position against the timeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpanHit {
    pub index: usize,
    pub span: TimelineSpan,
    /// Position within the span, clamped to `[0, 1]`.
    pub progress: f64,
    /// The position is at or past the final span's end.
    pub finished: bool,
}

/// Ordered, contiguous spans covering `[0, total)`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Timeline {
    spans: Vec<TimelineSpan>,
    total: f64,
}

impl Timeline {
    /// Lay out spans back to back from `(scene, duration)` pairs.
    pub fn from_durations(durations: impl IntoIterator<Item = (SceneId, f64)>) -> Self {
        let mut spans = Vec::new();
        let mut cursor = 0.0f64;
        for (scene, d) in durations {
            let end = cursor + d;
            spans.push(TimelineSpan {
                scene,
                start: cursor,
                end,
            });
            cursor = end;
        }
        Self {
            spans,
            total: cursor,
        }
    }

    pub fn spans(&self) -> &[TimelineSpan] {
        &self.spans
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Resolve the active span for `elapsed`.
    ///
    /// At or past the end the last span is returned with `finished = true`; positions before the
    /// first span (negative clock) resolve to the first span. `None` only for an empty timeline.
    pub fn locate(&self, elapsed: f64) -> Option<SpanHit> {
        let last = self.spans.len().checked_sub(1)?;
        let index = if elapsed >= self.spans[last].end {
            last
        } else {
            self.spans.iter().position(|s| s.contains(elapsed)).unwrap_or(0)
        };
        let span = self.spans[index];
        let progress = if span.duration() > 0.0 {
            ((elapsed - span.start) / span.duration()).clamp(0.0, 1.0)
        } else {
            1.0
        };
        Some(SpanHit {
            index,
            span,
            progress,
            finished: elapsed >= self.spans[last].end,
        })
    }
}

/// Duration a scene occupies: decoded narration length divided by `speed`, else its estimate.
pub fn scene_duration(scene: &Scene, narration: Option<&AudioPcm>, speed: f64) -> f64 {
    match narration {
        Some(buf) if !buf.is_empty() => buf.duration_secs() / speed,
        _ => scene.estimated_secs(),
    }
}

/// Build the timeline from the project's completed scenes.
#[tracing::instrument(level = "debug", skip(scenes, assets), fields(scenes = scenes.len()))]
pub fn build_timeline(scenes: &[Scene], assets: &AssetView<'_>, speed: f64) -> ReelResult<Timeline> {
    if !speed.is_finite() || speed <= 0.0 {
        return Err(ReelError::validation(format!(
            "narration speed must be finite and > 0, got {speed}"
        )));
    }
    let timeline = Timeline::from_durations(active_scenes(scenes).map(|scene| {
        let narration = assets.narration(scene);
        (scene.id, scene_duration(scene, narration.as_deref(), speed))
    }));
    tracing::debug!(
        spans = timeline.len(),
        total = timeline.total(),
        "timeline built"
    );
    Ok(timeline)
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/timeline.rs"]
mod tests;
