//! Per-frame encoders: JPEG for MJPEG/AVI, palette quantization for GIF/WebP

use std::sync::Arc;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
use image::ExtendedColorType;

use super::palette::Palette;
use crate::errors::RecorderError;
use crate::types::{ContainerFormat, RawFrame};

pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Clamp a requested JPEG quality into 1..=100, mapping 0 (unset) to 85
pub fn normalize_quality(quality: u8) -> u8 {
    match quality {
        0 => DEFAULT_JPEG_QUALITY,
        q => q.min(100),
    }
}

/// Result of encoding a single frame
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// Compressed or indexed frame bytes
    pub payload: Bytes,
    pub kind: FrameKind,
}

#[derive(Debug, Clone)]
pub enum FrameKind {
    /// Standalone JPEG stream (SOI..EOI)
    Jpeg { width: u32, height: u32 },
    /// One palette index per pixel, row-major
    Indexed {
        width: u32,
        height: u32,
        palette: Arc<Palette>,
    },
}

impl EncodedFrame {
    pub fn dimensions(&self) -> (u32, u32) {
        match &self.kind {
            FrameKind::Jpeg { width, height } => (*width, *height),
            FrameKind::Indexed { width, height, .. } => (*width, *height),
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn palette(&self) -> Option<&Arc<Palette>> {
        match &self.kind {
            FrameKind::Indexed { palette, .. } => Some(palette),
            FrameKind::Jpeg { .. } => None,
        }
    }
}

/// JPEG encoder bound to the recording's dimensions
#[derive(Debug, Clone)]
pub struct JpegEncoder {
    width: u32,
    height: u32,
    quality: u8,
    frame_count: u64,
}

impl JpegEncoder {
    pub fn new(width: u32, height: u32, quality: u8) -> Self {
        Self {
            width,
            height,
            quality: normalize_quality(quality),
            frame_count: 0,
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn encode(&mut self, frame: &RawFrame) -> Result<EncodedFrame, RecorderError> {
        check_frame(frame, self.width, self.height)?;

        let rgb = rgba_to_rgb(frame);
        let mut out = Vec::with_capacity(rgb.len() / 8);
        ImageJpegEncoder::new_with_quality(&mut out, self.quality)
            .encode(&rgb, frame.width, frame.height, ExtendedColorType::Rgb8)
            .map_err(|e| RecorderError::EncodingError(format!("JPEG encoding failed: {}", e)))?;

        self.frame_count += 1;

        Ok(EncodedFrame {
            payload: Bytes::from(out),
            kind: FrameKind::Jpeg {
                width: frame.width,
                height: frame.height,
            },
        })
    }
}

/// Maps pixels onto a fixed shared palette
#[derive(Debug, Clone)]
pub struct PaletteQuantizer {
    width: u32,
    height: u32,
    palette: Arc<Palette>,
    frame_count: u64,
}

/// Direct-mapped memo of recent color lookups
const CACHE_SLOTS: usize = 4096;

impl PaletteQuantizer {
    pub fn new(width: u32, height: u32, palette: Arc<Palette>) -> Self {
        Self {
            width,
            height,
            palette,
            frame_count: 0,
        }
    }

    pub fn palette(&self) -> &Arc<Palette> {
        &self.palette
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn quantize(&mut self, frame: &RawFrame) -> Result<EncodedFrame, RecorderError> {
        check_frame(frame, self.width, self.height)?;
        let indices = quantize_pixels(frame, &self.palette);
        self.frame_count += 1;

        Ok(EncodedFrame {
            payload: Bytes::from(indices),
            kind: FrameKind::Indexed {
                width: frame.width,
                height: frame.height,
                palette: self.palette.clone(),
            },
        })
    }
}

/// Nearest-color index for every visible pixel of `frame`
pub fn quantize_pixels(frame: &RawFrame, palette: &Palette) -> Vec<u8> {
    // Key 0 never collides with a real entry because of the marker bit.
    let mut cache = vec![(0u32, 0u8); CACHE_SLOTS];
    let mut indices = Vec::with_capacity(frame.width as usize * frame.height as usize);

    for y in 0..frame.height {
        for px in frame.row(y).chunks_exact(4) {
            let key =
                0x0100_0000 | ((px[0] as u32) << 16) | ((px[1] as u32) << 8) | (px[2] as u32);
            let slot = ((key ^ (key >> 12)) as usize) & (CACHE_SLOTS - 1);
            let (cached_key, cached_index) = cache[slot];
            let index = if cached_key == key {
                cached_index
            } else {
                let index = palette.nearest([px[0], px[1], px[2]]);
                cache[slot] = (key, index);
                index
            };
            indices.push(index);
        }
    }

    indices
}

/// Expand an indexed frame back to opaque RGBA
pub fn indexed_to_rgba(indices: &[u8], palette: &Palette) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(indices.len() * 4);
    for &i in indices {
        let c = palette.color(i);
        rgba.extend_from_slice(&[c[0], c[1], c[2], 255]);
    }
    rgba
}

/// Encoder variant chosen by the container format
#[derive(Debug, Clone)]
pub enum FrameEncoder {
    Jpeg(JpegEncoder),
    Palette(PaletteQuantizer),
}

impl FrameEncoder {
    pub fn for_format(
        format: ContainerFormat,
        width: u32,
        height: u32,
        quality: u8,
        palette: Arc<Palette>,
    ) -> Self {
        match format {
            ContainerFormat::Avi => FrameEncoder::Jpeg(JpegEncoder::new(width, height, quality)),
            ContainerFormat::Gif | ContainerFormat::Webp => {
                FrameEncoder::Palette(PaletteQuantizer::new(width, height, palette))
            }
        }
    }

    pub fn encode(&mut self, frame: &RawFrame) -> Result<EncodedFrame, RecorderError> {
        match self {
            FrameEncoder::Jpeg(enc) => enc.encode(frame),
            FrameEncoder::Palette(q) => q.quantize(frame),
        }
    }

    pub fn frame_count(&self) -> u64 {
        match self {
            FrameEncoder::Jpeg(enc) => enc.frame_count(),
            FrameEncoder::Palette(q) => q.frame_count(),
        }
    }
}

/// Buffer and dimension checks shared by every encoder
pub(crate) fn check_frame(frame: &RawFrame, width: u32, height: u32) -> Result<(), RecorderError> {
    frame.validate().map_err(RecorderError::EncodingError)?;
    if frame.width != width || frame.height != height {
        return Err(RecorderError::EncodingError(format!(
            "Frame dimensions {}x{} don't match recording dimensions {}x{}",
            frame.width, frame.height, width, height
        )));
    }
    Ok(())
}

/// Drop alpha and row padding
fn rgba_to_rgb(frame: &RawFrame) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(frame.width as usize * frame.height as usize * 3);
    for y in 0..frame.height {
        for px in frame.row(y).chunks_exact(4) {
            rgb.extend_from_slice(&px[..3]);
        }
    }
    rgb
}
