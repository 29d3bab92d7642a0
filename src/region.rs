//! Warp regions and the identity anchors that pin their borders.

pub mod anchors;
pub mod roi;
