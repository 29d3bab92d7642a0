//! Frame buffers and the CPU resample/composite stage.

pub mod composite;
pub mod frame;
pub mod resample;
