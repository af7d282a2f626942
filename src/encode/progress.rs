//! Export progress with ETA estimation.

use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStage {
    Preparing,
    Rendering,
    Muxing,
    Done,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportProgress {
    /// `0..=100`
    pub percent: f64,
    pub stage: ExportStage,
    pub current_frame: u64,
    pub total_frames: u64,
    /// Estimated seconds left; `None` until a rate is known.
    pub eta_secs: Option<f64>,
}

/// Frame-rate based ETA over one export run.
pub struct ProgressTracker {
    total: u64,
    start_time: Instant,
}

impl ProgressTracker {
    pub fn new(total_frames: u64) -> Self {
        Self {
            total: total_frames,
            start_time: Instant::now(),
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn report(&self, current: u64, stage: ExportStage) -> ExportProgress {
        let current = current.min(self.total);
        let percent = match stage {
            ExportStage::Done => 100.0,
            _ if self.total > 0 => (current as f64 / self.total as f64) * 100.0,
            _ => 0.0,
        };
        let eta_secs = match stage {
            ExportStage::Rendering => {
                estimate_remaining(self.start_time.elapsed().as_secs_f64(), current, self.total)
            }
            ExportStage::Done => Some(0.0),
            ExportStage::Preparing | ExportStage::Muxing => None,
        };
        ExportProgress {
            percent,
            stage,
            current_frame: current,
            total_frames: self.total,
            eta_secs,
        }
    }
}

/// Seconds left at the average rate so far.
pub fn estimate_remaining(elapsed_secs: f64, current: u64, total: u64) -> Option<f64> {
    if current == 0 || elapsed_secs <= 0.0 {
        return None;
    }
    if current >= total {
        return Some(0.0);
    }
    let rate = current as f64 / elapsed_secs;
    Some((total - current) as f64 / rate)
}

/// `m:ss`, e.g. `1:05`. Negative and non-finite input reads as `0:00`.
pub fn format_time(secs: f64) -> String {
    let whole = if secs.is_finite() && secs > 0.0 {
        secs.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", whole / 60, whole % 60)
}

/// Human-readable duration for logs, e.g. `42.0s`, `3m 5s`, `1h 2m 3s`.
pub fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{secs:.1}s")
    } else if secs < 3600.0 {
        let mins = (secs / 60.0).floor() as u64;
        let rest = secs - (mins as f64 * 60.0);
        format!("{mins}m {rest:.0}s")
    } else {
        let hours = (secs / 3600.0).floor() as u64;
        let rest = secs - (hours as f64 * 3600.0);
        let mins = (rest / 60.0).floor() as u64;
        let rest = rest - (mins as f64 * 60.0);
        format!("{hours}h {mins}m {rest:.0}s")
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/progress.rs"]
mod tests;
