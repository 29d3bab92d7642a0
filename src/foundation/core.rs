pub use kurbo::{Point, Rect, Vec2};

/// `true` when both coordinates are finite.
#[inline]
pub fn is_finite_point(p: Point) -> bool {
    p.x.is_finite() && p.y.is_finite()
}

/// Translate a frame-space point into the coordinate system of a region whose
/// top-left corner sits at `(origin_x, origin_y)`.
#[inline]
pub fn to_local(p: Point, origin_x: u32, origin_y: u32) -> Point {
    Point::new(p.x - f64::from(origin_x), p.y - f64::from(origin_y))
}

/// Linear combination `sum(w_i * p_i)` of points treated as vectors.
///
/// Weights are used as given; they are not required to sum to one.
pub fn weighted_sum(points: &[Point], weights: &[f64]) -> Point {
    let mut acc = Vec2::ZERO;
    for (p, &w) in points.iter().zip(weights) {
        acc += p.to_vec2() * w;
    }
    acc.to_point()
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
