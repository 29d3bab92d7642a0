//! Geometry re-exports, error types and small numeric helpers shared by every stage.

pub mod core;
pub mod error;
pub(crate) mod math;
