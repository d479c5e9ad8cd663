//! HTTP handlers, grouped by resource.

pub mod assets;
pub mod history;
pub mod jobs;
pub mod queue;
pub mod styles;
