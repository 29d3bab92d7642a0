use crate::{
    foundation::core::{Point, Rect, is_finite_point},
    rules::groups::ControlGroup,
};

/// Axis-aligned pixel rectangle inside a frame.
///
/// `x`/`y` is the top-left pixel; the region covers `x..x + width` by
/// `y..y + height`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Region {
    /// Left column.
    pub x: u32,
    /// Top row.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Region {
    /// Region from inclusive pixel bounds. Returns `None` if `x1 < x0` or `y1 < y0`.
    pub fn from_inclusive(x0: u32, y0: u32, x1: u32, y1: u32) -> Option<Self> {
        if x1 < x0 || y1 < y0 {
            return None;
        }
        Some(Self {
            x: x0,
            y: y0,
            width: x1 - x0 + 1,
            height: y1 - y0 + 1,
        })
    }

    /// Last column covered (inclusive).
    pub fn right(&self) -> u32 {
        self.x + self.width.saturating_sub(1)
    }

    /// Last row covered (inclusive).
    pub fn bottom(&self) -> u32 {
        self.y + self.height.saturating_sub(1)
    }

    /// Number of pixels covered.
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// `true` if the pixel `(px, py)` lies inside.
    pub fn contains_pixel(&self, px: u32, py: u32) -> bool {
        px >= self.x && py >= self.y && px <= self.right() && py <= self.bottom()
    }

    /// `true` if the inclusive pixel rectangle `[x0, x1] x [y0, y1]` lies inside.
    pub fn contains_inclusive(&self, x0: u32, y0: u32, x1: u32, y1: u32) -> bool {
        self.contains_pixel(x0, y0) && self.contains_pixel(x1, y1)
    }

    /// `true` if the region fits inside a `frame_w x frame_h` frame.
    pub fn fits(&self, frame_w: u32, frame_h: u32) -> bool {
        self.width > 0
            && self.height > 0
            && u64::from(self.x) + u64::from(self.width) <= u64::from(frame_w)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(frame_h)
    }
}

/// Minimum region side for a solver grid of `grid_size`: one full cell plus both
/// of its edge nodes on either side of the centre.
pub fn min_side_for_grid(grid_size: u32) -> u32 {
    grid_size.saturating_mul(2).saturating_add(1)
}

/// Pixel bounds of `points` expanded by `pad`, before any clamping.
///
/// Bounds snap outward to whole pixels (`floor` of the minimum, `ceil` of the
/// maximum). Non-finite points are ignored; returns `None` if nothing is left.
pub fn padded_bounds(points: impl IntoIterator<Item = Point>, pad: u32) -> Option<Rect> {
    let mut bounds: Option<Rect> = None;
    for p in points.into_iter().filter(|p| is_finite_point(*p)) {
        bounds = Some(match bounds {
            None => Rect::new(p.x, p.y, p.x, p.y),
            Some(r) => Rect::new(r.x0.min(p.x), r.y0.min(p.y), r.x1.max(p.x), r.y1.max(p.y)),
        });
    }
    let r = bounds?;
    let pad = f64::from(pad);
    Some(Rect::new(
        r.x0.floor() - pad,
        r.y0.floor() - pad,
        r.x1.ceil() + pad,
        r.y1.ceil() + pad,
    ))
}

/// Region covering every source and destination point of `groups`.
///
/// See [`region_for_points`].
pub fn region_for(
    groups: &[ControlGroup],
    frame_w: u32,
    frame_h: u32,
    pad: u32,
    min_side: u32,
) -> Option<Region> {
    region_for_points(
        groups.iter().flat_map(ControlGroup::all_points),
        frame_w,
        frame_h,
        pad,
        min_side,
    )
}

/// Padded bounding box of `points`, clamped to the frame and grown (centred) to at
/// least `min_side` on each axis where the frame allows it.
///
/// Returns `None` when the clamped region is empty or degenerate (one pixel wide
/// or tall), which callers treat as "nothing to warp".
pub fn region_for_points(
    points: impl IntoIterator<Item = Point>,
    frame_w: u32,
    frame_h: u32,
    pad: u32,
    min_side: u32,
) -> Option<Region> {
    if frame_w == 0 || frame_h == 0 {
        return None;
    }
    let bounds = padded_bounds(points, pad)?;
    let (x0, x1) = clamp_span(bounds.x0, bounds.x1, frame_w)?;
    let (y0, y1) = clamp_span(bounds.y0, bounds.y1, frame_h)?;
    let (x0, x1) = grow_span(x0, x1, min_side, frame_w);
    let (y0, y1) = grow_span(y0, y1, min_side, frame_h);

    let region = Region::from_inclusive(x0, y0, x1, y1)?;
    if region.width <= 1 || region.height <= 1 {
        return None;
    }
    Some(region)
}

fn clamp_span(lo: f64, hi: f64, extent: u32) -> Option<(u32, u32)> {
    let max = f64::from(extent - 1);
    if hi < 0.0 || lo > max {
        return None;
    }
    Some((lo.clamp(0.0, max) as u32, hi.clamp(0.0, max) as u32))
}

fn grow_span(lo: u32, hi: u32, min_side: u32, extent: u32) -> (u32, u32) {
    let len = hi - lo + 1;
    if len >= min_side {
        return (lo, hi);
    }
    if min_side >= extent {
        return (0, extent - 1);
    }
    let need = min_side - len;
    let mut lo = i64::from(lo) - i64::from(need / 2);
    let mut hi = i64::from(hi) + i64::from(need - need / 2);
    let max = i64::from(extent) - 1;
    if lo < 0 {
        hi -= lo;
        lo = 0;
    }
    if hi > max {
        lo -= hi - max;
        hi = max;
    }
    (lo.max(0) as u32, hi as u32)
}

#[cfg(test)]
#[path = "../../tests/unit/region/roi.rs"]
mod tests;
