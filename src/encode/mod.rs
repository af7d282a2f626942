//! Fixed-rate export into encoded containers.

pub mod export;
pub mod ffmpeg;
pub mod progress;
pub mod sink;
