//! Engine configuration and the per-frame pipeline.

pub mod config;
pub mod pipeline;
