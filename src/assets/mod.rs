//! Asset resolution: narration decode, visual loading, colors and text shaping.

pub mod color;
pub mod decode;
pub mod media;
pub mod store;
pub mod text;
