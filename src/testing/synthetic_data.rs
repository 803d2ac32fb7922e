//! Synthetic surfaces and frames
//!
//! These stand in for a real render target: they report bounds and copy
//! deterministic RGBA content on every readback.

use crate::capture::PixelSource;
use crate::errors::RecorderError;
use crate::types::RawFrame;

/// Build a frame whose gradient shifts with `frame_number`
pub fn synthetic_raw_frame(frame_number: u64, width: u32, height: u32) -> RawFrame {
    let mut pixels = vec![0u8; (width * height * 4) as usize];
    fill_gradient(&mut pixels, width as usize * 4, frame_number, width, height);
    RawFrame::new(width, height, pixels)
}

fn fill_gradient(dst: &mut [u8], stride: usize, frame_number: u64, width: u32, height: u32) {
    let base = (frame_number % 256) as u8;
    for y in 0..height {
        for x in 0..width {
            let idx = y as usize * stride + x as usize * 4;
            dst[idx] = base.wrapping_add((x % 256) as u8);
            dst[idx + 1] = base.wrapping_add((y % 256) as u8);
            dst[idx + 2] = base.wrapping_add(((x + y) % 256) as u8);
            dst[idx + 3] = 255;
        }
    }
}

/// Surface that always shows one color
#[derive(Debug, Clone)]
pub struct SolidSurface {
    pub width: u32,
    pub height: u32,
    pub rgba: [u8; 4],
    /// Number of readbacks performed so far
    pub reads: u64,
}

impl SolidSurface {
    pub fn new(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self {
            width,
            height,
            rgba,
            reads: 0,
        }
    }
}

impl PixelSource for SolidSurface {
    fn bounds(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn read_pixels(&mut self, dst: &mut [u8]) -> Result<(), RecorderError> {
        for px in dst.chunks_exact_mut(4) {
            px.copy_from_slice(&self.rgba);
        }
        self.reads += 1;
        Ok(())
    }
}

/// Surface whose content animates on each readback
#[derive(Debug, Clone)]
pub struct GradientSurface {
    pub width: u32,
    pub height: u32,
    pub frame_number: u64,
}

impl GradientSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_number: 0,
        }
    }
}

impl PixelSource for GradientSurface {
    fn bounds(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn read_pixels(&mut self, dst: &mut [u8]) -> Result<(), RecorderError> {
        let stride = self.row_stride();
        fill_gradient(dst, stride, self.frame_number, self.width, self.height);
        self.frame_number += 1;
        Ok(())
    }
}
