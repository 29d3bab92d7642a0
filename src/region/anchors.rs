use crate::{foundation::core::Point, region::roi::Region};

/// How identity anchors are laid along a warp region's border.
///
/// Anchors are pairs with `source == destination`; they pin the border so the
/// rigid fit cannot drag or curl pixels at the region edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AnchorStrategy {
    /// No anchors.
    None,
    /// One anchor per region corner.
    Corners,
    /// Anchors every `step` pixels around the full perimeter, corners included.
    /// `step` defaults to twice the solver grid size.
    Ring {
        /// Spacing in pixels; `None` means `2 * grid_size`.
        #[serde(default)]
        step: Option<u32>,
    },
}

impl Default for AnchorStrategy {
    fn default() -> Self {
        Self::Ring { step: None }
    }
}

impl AnchorStrategy {
    /// Ring step resolved against the solver grid size.
    pub fn ring_step(&self, grid_size: u32) -> Option<u32> {
        match *self {
            Self::Ring { step } => Some(step.unwrap_or(grid_size.saturating_mul(2)).max(1)),
            _ => None,
        }
    }
}

/// Append identity anchors for `region` to both `src` and `dst`.
///
/// Coordinates are region-local. With `inset == 0` and a ring step that is a
/// multiple of `grid_size`, every anchor lands on a solver grid node. Returns the
/// number of anchors added.
pub fn add_identity_anchors(
    region: &Region,
    src: &mut Vec<Point>,
    dst: &mut Vec<Point>,
    strategy: AnchorStrategy,
    grid_size: u32,
    inset: u32,
) -> usize {
    let anchors = anchor_positions(region, strategy, grid_size, inset);
    src.extend_from_slice(&anchors);
    dst.extend_from_slice(&anchors);
    anchors.len()
}

/// Region-local anchor positions for `strategy`, without duplicates.
pub fn anchor_positions(
    region: &Region,
    strategy: AnchorStrategy,
    grid_size: u32,
    inset: u32,
) -> Vec<Point> {
    if region.width == 0 || region.height == 0 {
        return Vec::new();
    }
    let max_x = region.width - 1;
    let max_y = region.height - 1;
    let left = inset.min(max_x / 2);
    let top = inset.min(max_y / 2);
    let right = max_x - left;
    let bottom = max_y - top;

    let mut out: Vec<(u32, u32)> = Vec::new();
    match strategy {
        AnchorStrategy::None => {}
        AnchorStrategy::Corners => {
            out.extend([(left, top), (right, top), (left, bottom), (right, bottom)]);
        }
        AnchorStrategy::Ring { .. } => {
            let step = strategy.ring_step(grid_size).unwrap_or(1);
            let xs = stops(left, right, step);
            let ys = stops(top, bottom, step);
            for &x in &xs {
                out.push((x, top));
                out.push((x, bottom));
            }
            for &y in &ys {
                out.push((left, y));
                out.push((right, y));
            }
        }
    }

    let mut seen = std::collections::HashSet::with_capacity(out.len());
    out.into_iter()
        .filter(|p| seen.insert(*p))
        .map(|(x, y)| Point::new(f64::from(x), f64::from(y)))
        .collect()
}

/// `lo, lo + step, ...` up to `hi`, always ending exactly on `hi`.
fn stops(lo: u32, hi: u32, step: u32) -> Vec<u32> {
    let mut v: Vec<u32> = (lo..=hi).step_by(step as usize).collect();
    if v.last() != Some(&hi) {
        v.push(hi);
    }
    v
}

#[cfg(test)]
#[path = "../../tests/unit/region/anchors.rs"]
mod tests;
