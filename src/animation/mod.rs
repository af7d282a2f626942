//! Per-frame animation math: easing, the Ken Burns push-in and subtitle planning.

pub mod ease;
pub mod kenburns;
pub mod subtitle;
