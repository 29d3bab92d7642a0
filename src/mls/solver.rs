//! Rigid Moving-Least-Squares displacement solver.
//!
//! The solver works in the backward-mapping convention: for every grid node `v`
//! of the output canvas it finds the location in the original image that should
//! land on `v`. Weights are measured against the *destination* points and the fit
//! maps them onto the *source* points, so `v + field(v)` is where to sample.
//!
//! For each node the fit is restricted to rotation plus uniform scale:
//!
//! ```text
//! w_k   = |v - dst_k|^(-2 * fall_off)
//! p*    = sum(w_k dst_k) / sum(w_k)          q* = sum(w_k src_k) / sum(w_k)
//! P_k   = dst_k - p*                         Q_k = src_k - q*
//! mu_r  = |(sum w_k Q_k . P_k, sum w_k Q_k . perp(P_k))|
//! f(v)  = q* + sum_k (w_k / mu_r) * Q_k * A_k(v - p*)
//! ```

use rayon::prelude::*;

use crate::foundation::{
    core::{Point, Vec2},
    error::{WarpError, WarpResult},
    math::perp,
};

/// `mu_r` / area values below this are treated as zero.
pub const DEGENERATE_EPS: f64 = 1e-12;

/// Solver parameters, fixed for the lifetime of an engine.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Spacing of displacement nodes in pixels (>= 1).
    pub grid_size: u32,
    /// Weight fall-off exponent; weights are `d^(-2 * fall_off)`.
    pub fall_off: f64,
    /// Equalize the bounding-box area of source vs destination points before fitting.
    pub pre_scale: bool,
    /// Evaluate node rows on the rayon pool.
    pub parallel: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            grid_size: 5,
            fall_off: 1.4,
            pre_scale: true,
            parallel: false,
        }
    }
}

impl SolverConfig {
    /// Check parameter ranges.
    pub fn validate(&self) -> WarpResult<()> {
        if self.grid_size == 0 {
            return Err(WarpError::validation("solver grid_size must be >= 1"));
        }
        if !self.fall_off.is_finite() || self.fall_off <= 0.0 {
            return Err(WarpError::validation(
                "solver fall_off must be finite and > 0",
            ));
        }
        Ok(())
    }
}

/// Sparse displacement grid over a `width x height` canvas.
///
/// Storage is dense and row-major, but only grid nodes are meaningful: columns
/// and rows at multiples of `grid_size`, plus the last column/row. Every other
/// cell holds zero until the resampler interpolates it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisplacementField {
    width: usize,
    height: usize,
    grid_size: usize,
    dx: Vec<f64>,
    dy: Vec<f64>,
}

impl DisplacementField {
    /// All-zero (identity) field.
    pub fn zeros(width: usize, height: usize, grid_size: usize) -> Self {
        let mut f = Self::default();
        f.reset(width, height, grid_size);
        f
    }

    /// Resize (reusing capacity) and zero the field.
    pub fn reset(&mut self, width: usize, height: usize, grid_size: usize) {
        self.width = width;
        self.height = height;
        self.grid_size = grid_size.max(1);
        let n = width * height;
        self.dx.clear();
        self.dx.resize(n, 0.0);
        self.dy.clear();
        self.dy.resize(n, 0.0);
    }

    /// Canvas width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Canvas height.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Node spacing.
    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    /// Displacement stored at `(x, y)`. Meaningful only at grid nodes.
    pub fn at(&self, x: usize, y: usize) -> Vec2 {
        let i = y * self.width + x;
        Vec2::new(self.dx[i], self.dy[i])
    }

    #[cfg(test)]
    pub(crate) fn set(&mut self, x: usize, y: usize, d: Vec2) {
        let i = y * self.width + x;
        self.dx[i] = d.x;
        self.dy[i] = d.y;
    }

    /// `true` if `(x, y)` is a grid node.
    pub fn is_node(&self, x: usize, y: usize) -> bool {
        is_node_index(x, self.width, self.grid_size) && is_node_index(y, self.height, self.grid_size)
    }

    /// Node columns, ascending.
    pub fn node_columns(&self) -> Vec<usize> {
        grid_nodes(self.width, self.grid_size)
    }

    /// Node rows, ascending.
    pub fn node_rows(&self) -> Vec<usize> {
        grid_nodes(self.height, self.grid_size)
    }

    /// `true` if every node displacement is exactly zero.
    pub fn is_identity(&self) -> bool {
        self.dx.iter().chain(&self.dy).all(|&v| v == 0.0)
    }

    /// `((min_dx, max_dx), (min_dy, max_dy))` over grid nodes.
    pub fn min_max(&self) -> ((f64, f64), (f64, f64)) {
        let mut mx = (f64::INFINITY, f64::NEG_INFINITY);
        let mut my = (f64::INFINITY, f64::NEG_INFINITY);
        for y in self.node_rows() {
            for x in self.node_columns() {
                let d = self.at(x, y);
                mx = (mx.0.min(d.x), mx.1.max(d.x));
                my = (my.0.min(d.y), my.1.max(d.y));
            }
        }
        if mx.0 > mx.1 {
            return ((0.0, 0.0), (0.0, 0.0));
        }
        (mx, my)
    }
}

/// Node coordinates along an axis of length `extent`: `0, g, 2g, ...` and `extent - 1`.
pub fn grid_nodes(extent: usize, grid_size: usize) -> Vec<usize> {
    if extent == 0 {
        return Vec::new();
    }
    let g = grid_size.max(1);
    let mut v: Vec<usize> = (0..extent).step_by(g).collect();
    if v.last() != Some(&(extent - 1)) {
        v.push(extent - 1);
    }
    v
}

fn is_node_index(i: usize, extent: usize, grid_size: usize) -> bool {
    i < extent && (i % grid_size.max(1) == 0 || i + 1 == extent)
}

/// Rigid MLS solver with reusable scratch buffers.
#[derive(Clone, Debug)]
pub struct RigidMls {
    config: SolverConfig,
    weights: Vec<f64>,
    scaled_src: Vec<Point>,
}

impl RigidMls {
    /// Create a solver. Call [`SolverConfig::validate`] first for untrusted input.
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            scaled_src: Vec::new(),
        }
    }

    /// Solver parameters.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solve into a new field.
    pub fn solve(
        &mut self,
        src: &[Point],
        dst: &[Point],
        width: u32,
        height: u32,
    ) -> WarpResult<DisplacementField> {
        let mut field = DisplacementField::default();
        self.solve_into(src, dst, width, height, &mut field)?;
        Ok(field)
    }

    /// Solve into `field`, reusing its allocation.
    ///
    /// `src[k]`/`dst[k]` are region-local control pairs. Fewer than two pairs, or
    /// pairs that are all identities, produce an all-zero field.
    pub fn solve_into(
        &mut self,
        src: &[Point],
        dst: &[Point],
        width: u32,
        height: u32,
        field: &mut DisplacementField,
    ) -> WarpResult<()> {
        if src.len() != dst.len() {
            return Err(WarpError::validation(format!(
                "control point count mismatch: {} sources vs {} destinations",
                src.len(),
                dst.len()
            )));
        }
        if width == 0 || height == 0 {
            return Err(WarpError::validation("solver canvas must be non-empty"));
        }
        self.config.validate()?;

        let (w, h) = (width as usize, height as usize);
        let grid = self.config.grid_size as usize;
        field.reset(w, h, grid);

        if src.len() < 2 {
            tracing::trace!(points = src.len(), "fewer than two control points; identity field");
            return Ok(());
        }
        if src.iter().zip(dst).all(|(s, d)| s == d) {
            return Ok(());
        }

        let ratio = self.prepare_sources(src, dst);
        let params = NodeParams {
            src,
            scaled_src: &self.scaled_src,
            dst,
            fall_off: self.config.fall_off,
            ratio,
        };

        let columns = grid_nodes(w, grid);
        let DisplacementField { dx, dy, .. } = field;

        if self.config.parallel {
            let n = src.len();
            dx.par_chunks_mut(w)
                .zip(dy.par_chunks_mut(w))
                .enumerate()
                .filter(|(y, _)| is_node_index(*y, h, grid))
                .for_each_init(
                    || vec![0.0f64; n],
                    |weights, (y, (row_dx, row_dy))| {
                        solve_row(&params, y, &columns, weights, row_dx, row_dy);
                    },
                );
        } else {
            self.weights.clear();
            self.weights.resize(src.len(), 0.0);
            for y in grid_nodes(h, grid) {
                let row = y * w..(y + 1) * w;
                solve_row(
                    &params,
                    y,
                    &columns,
                    &mut self.weights,
                    &mut dx[row.clone()],
                    &mut dy[row],
                );
            }
        }
        Ok(())
    }

    /// Fill `scaled_src` and return the pre-scale ratio (1 when disabled or unsafe).
    fn prepare_sources(&mut self, src: &[Point], dst: &[Point]) -> f64 {
        let ratio = if self.config.pre_scale {
            pre_scale_ratio(src, dst)
        } else {
            1.0
        };
        self.scaled_src.clear();
        self.scaled_src
            .extend(src.iter().map(|p| (p.to_vec2() / ratio).to_point()));
        ratio
    }
}

/// Solve with a throwaway solver.
pub fn solve(
    src: &[Point],
    dst: &[Point],
    width: u32,
    height: u32,
    config: SolverConfig,
) -> WarpResult<DisplacementField> {
    RigidMls::new(config).solve(src, dst, width, height)
}

/// `sqrt(area(src) / area(dst))` over bounding boxes, or 1 when either area is
/// ~0 or the ratio is not a usable finite number.
pub fn pre_scale_ratio(src: &[Point], dst: &[Point]) -> f64 {
    let a_src = bbox_area(src);
    let a_dst = bbox_area(dst);
    if a_src <= DEGENERATE_EPS || a_dst <= DEGENERATE_EPS {
        return 1.0;
    }
    let ratio = (a_src / a_dst).sqrt();
    if ratio.is_finite() && ratio > DEGENERATE_EPS {
        ratio
    } else {
        1.0
    }
}

fn bbox_area(points: &[Point]) -> f64 {
    let Some(first) = points.first() else {
        return 0.0;
    };
    let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
    for p in &points[1..] {
        x0 = x0.min(p.x);
        y0 = y0.min(p.y);
        x1 = x1.max(p.x);
        y1 = y1.max(p.y);
    }
    ((x1 - x0) * (y1 - y0)).max(0.0)
}

struct NodeParams<'a> {
    src: &'a [Point],
    scaled_src: &'a [Point],
    dst: &'a [Point],
    fall_off: f64,
    ratio: f64,
}

fn solve_row(
    params: &NodeParams<'_>,
    y: usize,
    columns: &[usize],
    weights: &mut [f64],
    row_dx: &mut [f64],
    row_dy: &mut [f64],
) {
    for &x in columns {
        let v = Point::new(x as f64, y as f64);
        let d = displacement_at(params, v, weights);
        row_dx[x] = d.x;
        row_dy[x] = d.y;
    }
}

/// Displacement at node `v`: mapped position minus `v`.
fn displacement_at(params: &NodeParams<'_>, v: Point, weights: &mut [f64]) -> Vec2 {
    match accumulate_weights(params, v, weights) {
        Centroids::OnControl(k) => params.src[k] - v,
        Centroids::Weighted { p_star, q_star } => {
            let mapped = rigid_map(params, v, weights, p_star, q_star);
            mapped.to_vec2() * params.ratio - v.to_vec2()
        }
    }
}

enum Centroids {
    /// `v` coincides with `dst[k]`, or the weights overflowed next to it.
    OnControl(usize),
    Weighted { p_star: Point, q_star: Point },
}

/// First pass: weights and weighted centroids.
fn accumulate_weights(params: &NodeParams<'_>, v: Point, weights: &mut [f64]) -> Centroids {
    let mut sw = 0.0;
    let mut swp = Vec2::ZERO;
    let mut swq = Vec2::ZERO;
    let mut nearest = (0usize, f64::INFINITY);

    for (k, (&d, &s)) in params.dst.iter().zip(params.scaled_src).enumerate() {
        if d == v {
            return Centroids::OnControl(k);
        }
        let diff = v - d;
        let d2 = diff.dot(diff);
        if d2 < nearest.1 {
            nearest = (k, d2);
        }
        let wk = if params.fall_off == 1.0 {
            1.0 / d2
        } else {
            d2.powf(-params.fall_off)
        };
        weights[k] = wk;
        sw += wk;
        swp += d.to_vec2() * wk;
        swq += s.to_vec2() * wk;
    }

    if !sw.is_finite() || sw <= 0.0 || !swp.x.is_finite() || !swp.y.is_finite() {
        return Centroids::OnControl(nearest.0);
    }
    Centroids::Weighted {
        p_star: (swp / sw).to_point(),
        q_star: (swq / sw).to_point(),
    }
}

/// Second pass: rotation/scale normaliser `mu_r` and the mapped position.
///
/// Falls back to the pure translation `q*` when `mu_r` is ~0 or not finite.
fn rigid_map(
    params: &NodeParams<'_>,
    v: Point,
    weights: &[f64],
    p_star: Point,
    q_star: Point,
) -> Point {
    let mut s1 = 0.0;
    let mut s2 = 0.0;
    for (k, (&d, &s)) in params.dst.iter().zip(params.scaled_src).enumerate() {
        let pi = d - p_star;
        let qi = s - q_star;
        s1 += weights[k] * qi.dot(pi);
        s2 += weights[k] * qi.dot(perp(pi));
    }
    let mu_r = (s1 * s1 + s2 * s2).sqrt();
    if !mu_r.is_finite() || mu_r < DEGENERATE_EPS {
        return q_star;
    }

    let cur = v - p_star;
    let cur_j = perp(cur);
    let mut acc = Vec2::ZERO;
    for (k, (&d, &s)) in params.dst.iter().zip(params.scaled_src).enumerate() {
        let pi = d - p_star;
        let pi_j = perp(pi);
        let qi = s - q_star;
        let t = Vec2::new(
            pi.dot(cur) * qi.x - pi_j.dot(cur) * qi.y,
            -pi.dot(cur_j) * qi.x + pi_j.dot(cur_j) * qi.y,
        );
        acc += t * (weights[k] / mu_r);
    }
    q_star + acc
}

#[cfg(test)]
#[path = "../../tests/unit/mls/solver.rs"]
mod tests;
