//! Rigid Moving-Least-Squares solving and its observer hooks.

pub mod diagnostics;
pub mod solver;
