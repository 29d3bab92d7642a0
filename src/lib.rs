//! facewarp reshapes video frames around facial landmarks.
//!
//! A rule file says which landmark should move toward which combination of other
//! landmarks. For every frame the engine turns those rules into control-point
//! pairs and warps the affected region in place with a rigid Moving-Least-Squares
//! deformation. Intensity scales the effect and may be negative to invert it.
//!
//! # Pipeline overview
//!
//! 1. **Rules**: `rule file -> RuleSet` (loaded once)
//! 2. **Groups**: `RuleSet + landmarks + intensity -> Vec<ControlGroup>`
//! 3. **Region**: `groups -> Region`, plus identity anchors along its border
//! 4. **Solve**: `control pairs -> DisplacementField` (sparse grid, backward mapping)
//! 5. **Resample**: `original region + field -> Patch`, composited back into the frame
//!
//! [`DeformEngine`] runs the whole chain per frame. Conditions such as "no face"
//! or "rules do not fit this landmark topology" are reported as a
//! [`FrameOutcome`] and leave the frame untouched; only load-time and contract
//! failures are [`WarpError`]s.
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Deterministic**: identical input gives identical pixels, with or without
//!   the parallel solver.
//! - **Stride-aware**: host buffers are only ever touched row by row.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod engine;
mod foundation;
mod landmarks;
mod mls;
mod region;
mod render;
mod rules;

pub use engine::config::{EngineConfig, MAX_INTENSITY, RegionConfig, RegionMode};
pub use engine::pipeline::{DeformEngine, FrameOutcome, FrameReport, SkipReason};
pub use foundation::core::{Point, Rect, Vec2, is_finite_point, to_local, weighted_sum};
pub use foundation::error::{WarpError, WarpResult};
pub use landmarks::source::{Face, LandmarkSource, NormalizedLandmark, StaticLandmarks};
pub use mls::diagnostics::{
    ControlStats, NoDiagnostics, TracingDiagnostics, WarpDiagnostics, mean_l1,
};
pub use mls::solver::{
    DEGENERATE_EPS, DisplacementField, RigidMls, SolverConfig, grid_nodes, pre_scale_ratio, solve,
};
pub use region::anchors::{AnchorStrategy, add_identity_anchors, anchor_positions};
pub use region::roi::{Region, min_side_for_grid, padded_bounds, region_for, region_for_points};
pub use render::composite::{composite, extract, extract_into};
pub use render::frame::{FrameMut, FrameView, Patch, PixelFormat};
pub use render::resample::{resample, resample_into};
pub use rules::groups::{ControlGroup, ControlPair, build_groups, evaluate_rule, total_pairs};
pub use rules::store::{RULE_FIELDS, Rule, RuleSet, parse_rule_line};
