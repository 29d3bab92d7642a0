//! Rule files and their per-frame evaluation into control-point groups.

pub mod groups;
pub mod store;
