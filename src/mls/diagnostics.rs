use crate::{
    foundation::{core::Point, math::checksum},
    mls::solver::DisplacementField,
    region::roi::Region,
    render::frame::Patch,
};

/// Observer hooks called by the engine while a warp is in flight.
///
/// Injected once at construction. Every hook defaults to a no-op so an
/// implementation only overrides what it inspects; none of them can change the
/// warp result.
pub trait WarpDiagnostics: Send {
    /// Region-local control pairs handed to the solver, anchors included.
    fn on_controls(&mut self, _region: &Region, _src: &[Point], _dst: &[Point]) {}

    /// Displacement field right after solving.
    fn on_field(&mut self, _field: &DisplacementField) {}

    /// Region contents before and after resampling.
    fn on_patch(&mut self, _region: &Region, _before: &Patch, _after: &Patch) {}
}

/// Diagnostics that do nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDiagnostics;

impl WarpDiagnostics for NoDiagnostics {}

/// Emits control, field and patch statistics through `tracing::debug!`.
#[derive(Clone, Debug, Default)]
pub struct TracingDiagnostics {
    /// Number of patches inspected so far.
    pub patches: u64,
}

impl WarpDiagnostics for TracingDiagnostics {
    fn on_controls(&mut self, region: &Region, src: &[Point], dst: &[Point]) {
        let stats = ControlStats::from_pairs(src, dst);
        tracing::debug!(
            region.x = region.x,
            region.y = region.y,
            region.width = region.width,
            region.height = region.height,
            points = src.len(),
            moving = stats.moving,
            mean_shift = stats.mean_shift,
            max_shift = stats.max_shift,
            "controls"
        );
    }

    fn on_field(&mut self, field: &DisplacementField) {
        let ((min_dx, max_dx), (min_dy, max_dy)) = field.min_max();
        tracing::debug!(
            width = field.width(),
            height = field.height(),
            grid = field.grid_size(),
            min_dx,
            max_dx,
            min_dy,
            max_dy,
            "field"
        );
    }

    fn on_patch(&mut self, region: &Region, before: &Patch, after: &Patch) {
        self.patches += 1;
        tracing::debug!(
            region.x = region.x,
            region.y = region.y,
            before = checksum(before.data()),
            after = checksum(after.data()),
            mean_l1 = mean_l1(before.data(), after.data()),
            "patch"
        );
    }
}

/// Displacement statistics over control pairs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ControlStats {
    /// Pairs whose source and destination differ.
    pub moving: usize,
    /// Mean `|dst - src|` over all pairs.
    pub mean_shift: f64,
    /// Largest `|dst - src|`.
    pub max_shift: f64,
}

impl ControlStats {
    /// Compute statistics over zipped pairs.
    pub fn from_pairs(src: &[Point], dst: &[Point]) -> Self {
        let mut out = Self::default();
        let mut n = 0usize;
        let mut total = 0.0;
        for (s, d) in src.iter().zip(dst) {
            let len = (*d - *s).hypot();
            if len > 0.0 {
                out.moving += 1;
            }
            total += len;
            out.max_shift = out.max_shift.max(len);
            n += 1;
        }
        if n > 0 {
            out.mean_shift = total / n as f64;
        }
        out
    }
}

/// Mean absolute per-byte difference of two equally sized buffers (0 if empty
/// or mismatched).
pub fn mean_l1(a: &[u8], b: &[u8]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let sum: u64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| u64::from(x.abs_diff(y)))
        .sum();
    sum as f64 / a.len() as f64
}

#[cfg(test)]
#[path = "../../tests/unit/mls/diagnostics.rs"]
mod tests;
