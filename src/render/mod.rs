//! Frame planning and rasterization.

pub mod backend;
pub mod compositor;
pub mod cpu;
pub mod effects;
