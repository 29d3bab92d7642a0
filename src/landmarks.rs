//! Landmark detector seam.

pub mod source;
