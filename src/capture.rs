//! Pixel readback from render surfaces
//!
//! A surface is anything that can report its bounds and copy its pixels out
//! as RGBA, 4 bytes per pixel, non-premultiplied. Readback happens on the
//! calling thread and is usually the most expensive part of a tick.

use crate::errors::RecorderError;
use crate::types::RawFrame;

/// Render surface that can be sampled once per frame
pub trait PixelSource {
    /// Current surface size in pixels
    fn bounds(&self) -> (u32, u32);

    /// Bytes between the starts of two consecutive rows
    fn row_stride(&self) -> usize {
        self.bounds().0 as usize * 4
    }

    /// Copy the whole surface into `dst`, which is `row_stride() * height`
    /// bytes long.
    fn read_pixels(&mut self, dst: &mut [u8]) -> Result<(), RecorderError>;
}

impl<S: PixelSource + ?Sized> PixelSource for &mut S {
    fn bounds(&self) -> (u32, u32) {
        (**self).bounds()
    }

    fn row_stride(&self) -> usize {
        (**self).row_stride()
    }

    fn read_pixels(&mut self, dst: &mut [u8]) -> Result<(), RecorderError> {
        (**self).read_pixels(dst)
    }
}

/// Read back the full surface into a freshly owned frame
pub fn capture<S: PixelSource + ?Sized>(surface: &mut S) -> Result<RawFrame, RecorderError> {
    let (width, height) = surface.bounds();
    if width == 0 || height == 0 {
        return Err(RecorderError::CaptureError(format!(
            "surface reports zero-size bounds {}x{}",
            width, height
        )));
    }

    let stride = surface.row_stride();
    if stride < width as usize * 4 {
        return Err(RecorderError::CaptureError(format!(
            "row stride {} too small for width {}",
            stride, width
        )));
    }

    let mut pixels = vec![0u8; stride * height as usize];
    surface.read_pixels(&mut pixels)?;

    Ok(RawFrame::with_stride(width, height, stride, pixels))
}
