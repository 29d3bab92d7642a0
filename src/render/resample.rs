use crate::{
    foundation::{
        error::{WarpError, WarpResult},
        math::{bilerp, round_to_u8},
    },
    mls::solver::DisplacementField,
    render::frame::{PixelFormat, Patch},
};

/// Enclosing grid cell of a pixel along one axis: lower node, upper node and the
/// normalized position between them.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Cell {
    n0: usize,
    n1: usize,
    t: f64,
}

fn cells(extent: usize, grid: usize) -> Vec<Cell> {
    let g = grid.max(1);
    (0..extent)
        .map(|i| {
            let n0 = (i / g) * g;
            let n1 = (n0 + g).min(extent - 1);
            let t = if n1 > n0 {
                (i - n0) as f64 / (n1 - n0) as f64
            } else {
                0.0
            };
            Cell { n0, n1, t }
        })
        .collect()
}

/// Warp `original` through `field` into a new patch.
pub fn resample(original: &Patch, field: &DisplacementField) -> WarpResult<Patch> {
    let mut out = Patch::new(original.width(), original.height(), original.format());
    resample_into(original, field, &mut out)?;
    Ok(out)
}

/// Warp `original` through `field` into `out`, reusing its buffer.
///
/// Each output pixel `(x, y)` interpolates its displacement from the four nodes
/// of its grid cell, then samples the three color channels of `original` at
/// `(x + dx, y + dy)` (clamped to the patch) with bilinear filtering. Alpha is
/// copied from `original` at `(x, y)` unchanged.
pub fn resample_into(
    original: &Patch,
    field: &DisplacementField,
    out: &mut Patch,
) -> WarpResult<()> {
    let (w, h) = (original.width() as usize, original.height() as usize);
    if field.width() != w || field.height() != h {
        return Err(WarpError::validation(format!(
            "displacement field {}x{} does not match patch {w}x{h}",
            field.width(),
            field.height()
        )));
    }
    let format = original.format();
    out.reset(original.width(), original.height(), format);
    if w == 0 || h == 0 {
        return Ok(());
    }

    let bpp = format.bytes_per_pixel();
    let alpha = format.alpha_index();
    let src = original.data();
    let row_bytes = w * bpp;
    let max_x = (w - 1) as f64;
    let max_y = (h - 1) as f64;
    let col_cells = cells(w, field.grid_size());
    let row_cells = cells(h, field.grid_size());

    for (y, rc) in row_cells.iter().enumerate() {
        let out_row = out.row_mut(y as u32);
        for (x, cc) in col_cells.iter().enumerate() {
            let d00 = field.at(cc.n0, rc.n0);
            let d10 = field.at(cc.n1, rc.n0);
            let d01 = field.at(cc.n0, rc.n1);
            let d11 = field.at(cc.n1, rc.n1);
            let dx = bilerp(d00.x, d10.x, d01.x, d11.x, cc.t, rc.t);
            let dy = bilerp(d00.y, d10.y, d01.y, d11.y, cc.t, rc.t);

            let sx = sanitize(x as f64 + dx, x as f64).clamp(0.0, max_x);
            let sy = sanitize(y as f64 + dy, y as f64).clamp(0.0, max_y);
            let x0 = sx.floor() as usize;
            let y0 = sy.floor() as usize;
            let x1 = (x0 + 1).min(w - 1);
            let y1 = (y0 + 1).min(h - 1);
            let fx = sx - x0 as f64;
            let fy = sy - y0 as f64;

            let o = x * bpp;
            let p00 = y0 * row_bytes + x0 * bpp;
            let p10 = y0 * row_bytes + x1 * bpp;
            let p01 = y1 * row_bytes + x0 * bpp;
            let p11 = y1 * row_bytes + x1 * bpp;
            for c in 0..PixelFormat::COLOR_CHANNELS {
                let v = bilerp(
                    f64::from(src[p00 + c]),
                    f64::from(src[p10 + c]),
                    f64::from(src[p01 + c]),
                    f64::from(src[p11 + c]),
                    fx,
                    fy,
                );
                out_row[o + c] = round_to_u8(v);
            }
            if let Some(a) = alpha {
                out_row[o + a] = src[y * row_bytes + o + a];
            }
        }
    }
    Ok(())
}

/// A non-finite sample position falls back to the pixel itself.
#[inline]
fn sanitize(v: f64, fallback: f64) -> f64 {
    if v.is_finite() { v } else { fallback }
}

#[cfg(test)]
#[path = "../../tests/unit/render/resample.rs"]
mod tests;
