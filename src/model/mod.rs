//! Boundary data model: scenes, subtitle style and project files.

pub mod project;
pub mod scene;
pub mod style;
