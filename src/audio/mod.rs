//! Audio clock, source scheduling and mixing.

pub mod context;
#[cfg(feature = "device-audio")]
pub mod device;
pub mod graph;
pub(crate) mod mix;
