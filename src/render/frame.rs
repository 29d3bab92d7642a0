use crate::foundation::error::{WarpError, WarpResult};

/// Interleaved 8-bit pixel layouts accepted by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// `R, G, B, A`.
    Rgba8,
    /// `B, G, R, A`.
    Bgra8,
    /// `R, G, B`, no alpha.
    Rgb8,
}

impl PixelFormat {
    /// Number of color (non-alpha) channels; always the leading channels.
    pub const COLOR_CHANNELS: usize = 3;

    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 | Self::Bgra8 => 4,
            Self::Rgb8 => 3,
        }
    }

    /// Byte offset of the alpha channel within a pixel, if any.
    pub fn alpha_index(self) -> Option<usize> {
        match self {
            Self::Rgba8 | Self::Bgra8 => Some(3),
            Self::Rgb8 => None,
        }
    }
}

fn check_layout(
    len: usize,
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
) -> WarpResult<()> {
    if width == 0 || height == 0 {
        return Err(WarpError::frame("frame width/height must be > 0"));
    }
    let row_bytes = (width as usize)
        .checked_mul(format.bytes_per_pixel())
        .ok_or_else(|| WarpError::frame("frame row size overflow"))?;
    if stride < row_bytes {
        return Err(WarpError::frame(format!(
            "stride {stride} is smaller than a row of {row_bytes} bytes"
        )));
    }
    let needed = stride
        .checked_mul(height as usize - 1)
        .and_then(|v| v.checked_add(row_bytes))
        .ok_or_else(|| WarpError::frame("frame buffer size overflow"))?;
    if len < needed {
        return Err(WarpError::frame(format!(
            "frame buffer holds {len} bytes, {width}x{height} with stride {stride} needs {needed}"
        )));
    }
    Ok(())
}

/// Mutable view of a host frame. Rows are `stride` bytes apart; only the first
/// `width * bytes_per_pixel` bytes of each row are pixels.
#[derive(Debug)]
pub struct FrameMut<'a> {
    data: &'a mut [u8],
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
}

impl<'a> FrameMut<'a> {
    /// Wrap a host buffer after checking its geometry.
    pub fn new(
        data: &'a mut [u8],
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
    ) -> WarpResult<Self> {
        check_layout(data.len(), width, height, stride, format)?;
        Ok(Self {
            data,
            width,
            height,
            stride,
            format,
        })
    }

    /// Wrap a tightly packed buffer (`stride == width * bpp`).
    pub fn packed(
        data: &'a mut [u8],
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> WarpResult<Self> {
        let stride = width as usize * format.bytes_per_pixel();
        Self::new(data, width, height, stride, format)
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes from the start of one row to the next.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Pixel layout.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Pixel bytes of row `y` (padding excluded).
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.row_bytes()]
    }

    /// Mutable pixel bytes of row `y` (padding excluded).
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        let len = self.row_bytes();
        &mut self.data[start..start + len]
    }

    /// Read-only view of the same frame.
    pub fn as_view(&self) -> FrameView<'_> {
        FrameView {
            data: &*self.data,
            width: self.width,
            height: self.height,
            stride: self.stride,
            format: self.format,
        }
    }

    fn row_bytes(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }
}

/// Read-only counterpart of [`FrameMut`], handed to landmark sources.
#[derive(Clone, Copy, Debug)]
pub struct FrameView<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
}

impl<'a> FrameView<'a> {
    /// Wrap a host buffer after checking its geometry.
    pub fn new(
        data: &'a [u8],
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
    ) -> WarpResult<Self> {
        check_layout(data.len(), width, height, stride, format)?;
        Ok(Self {
            data,
            width,
            height,
            stride,
            format,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes from the start of one row to the next.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Pixel layout.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Pixel bytes of row `y` (padding excluded).
    pub fn row(&self, y: u32) -> &'a [u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize * self.format.bytes_per_pixel()]
    }
}

/// Tightly packed pixel block the size of a warp region.
///
/// Holds the original region contents before resampling and the warped result
/// after it. Buffers are reused across frames via [`Patch::reset`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Patch {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl Patch {
    /// Zero-filled patch.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let mut p = Self {
            width: 0,
            height: 0,
            format,
            data: Vec::new(),
        };
        p.reset(width, height, format);
        p
    }

    /// Wrap packed pixel bytes.
    pub fn from_raw(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> WarpResult<Self> {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(WarpError::frame(format!(
                "patch {width}x{height} expects {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// Resize (reusing capacity) and zero the patch.
    pub fn reset(&mut self, width: u32, height: u32, format: PixelFormat) {
        self.width = width;
        self.height = height;
        self.format = format;
        self.data.clear();
        self.data
            .resize(width as usize * height as usize * format.bytes_per_pixel(), 0);
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel layout.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Packed pixel bytes, row after row.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable packed pixel bytes.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Take the packed pixel bytes.
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Bytes per row.
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Bytes of row `y`.
    pub fn row(&self, y: u32) -> &[u8] {
        let rb = self.row_bytes();
        let start = y as usize * rb;
        &self.data[start..start + rb]
    }

    /// Mutable bytes of row `y`.
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let rb = self.row_bytes();
        let start = y as usize * rb;
        &mut self.data[start..start + rb]
    }

    /// Bytes of pixel `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        let start = (y as usize * self.width as usize + x as usize) * bpp;
        &self.data[start..start + bpp]
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/frame.rs"]
mod tests;
