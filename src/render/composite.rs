use crate::{
    foundation::error::{WarpError, WarpResult},
    region::roi::Region,
    render::frame::{FrameMut, FrameView, Patch},
};

/// Copy `region` out of `frame` into a packed patch.
pub fn extract(frame: &FrameView<'_>, region: &Region) -> WarpResult<Patch> {
    let mut patch = Patch::new(region.width, region.height, frame.format());
    extract_into(frame, region, &mut patch)?;
    Ok(patch)
}

/// Copy `region` out of `frame` into `patch`, reusing its buffer.
pub fn extract_into(frame: &FrameView<'_>, region: &Region, patch: &mut Patch) -> WarpResult<()> {
    check_region(region, frame.width(), frame.height())?;
    let bpp = frame.format().bytes_per_pixel();
    patch.reset(region.width, region.height, frame.format());
    let x0 = region.x as usize * bpp;
    let x1 = x0 + region.width as usize * bpp;
    for row in 0..region.height {
        let src = frame.row(region.y + row);
        patch.row_mut(row).copy_from_slice(&src[x0..x1]);
    }
    Ok(())
}

/// Write `patch` into `frame` at `region`, touching nothing outside it.
pub fn composite(frame: &mut FrameMut<'_>, patch: &Patch, region: &Region) -> WarpResult<()> {
    check_region(region, frame.width(), frame.height())?;
    if patch.width() != region.width || patch.height() != region.height {
        return Err(WarpError::validation(format!(
            "patch {}x{} does not match region {}x{}",
            patch.width(),
            patch.height(),
            region.width,
            region.height
        )));
    }
    if patch.format() != frame.format() {
        return Err(WarpError::validation(format!(
            "patch format {:?} does not match frame format {:?}",
            patch.format(),
            frame.format()
        )));
    }
    let bpp = frame.format().bytes_per_pixel();
    let x0 = region.x as usize * bpp;
    let x1 = x0 + region.width as usize * bpp;
    for row in 0..region.height {
        frame.row_mut(region.y + row)[x0..x1].copy_from_slice(patch.row(row));
    }
    Ok(())
}

fn check_region(region: &Region, width: u32, height: u32) -> WarpResult<()> {
    if region.width == 0 || region.height == 0 || !region.fits(width, height) {
        return Err(WarpError::validation(format!(
            "region {region:?} does not fit a {width}x{height} frame"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/render/composite.rs"]
mod tests;
