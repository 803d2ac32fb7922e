//! Animated WebP, buffered in memory and written on finalize
//!
//! Each indexed frame is expanded back to RGBA and compressed losslessly;
//! the resulting `VP8L` bitstreams are wrapped in `ANMF` chunks behind a
//! `VP8X` + `ANIM` header.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use image::codecs::webp::WebPEncoder;
use image::ExtendedColorType;

use super::riff::{find_chunk, put_chunk, put_fourcc, put_u16, put_u24, put_u32};
use super::{check_dimensions, ContainerSummary, ContainerWriter, FlushTarget};
use crate::errors::RecorderError;
use crate::recording::encoder::{indexed_to_rgba, EncodedFrame, FrameKind};
use crate::recording::palette::Palette;
use crate::timing::{media_duration_secs, webp_duration_millis};
use crate::types::ContainerFormat;

/// Canvas and frame sizes are stored as 24-bit `value - 1`
const MAX_DIMENSION: u32 = 1 << 24;
const MAX_DURATION_MS: u32 = (1 << 24) - 1;

const VP8X_FLAG_ALPHA: u8 = 0x10;
const VP8X_FLAG_ANIMATION: u8 = 0x02;
/// Do not alpha-blend onto the previous canvas; disposal bit 0 = keep
const ANMF_FLAG_NO_BLEND: u8 = 0x02;
/// Fully transparent, stored as BGRA
const BACKGROUND_COLOR: u32 = 0x0000_0000;
const LOOP_FOREVER: u16 = 0;

pub struct WebpWriter {
    target: Option<FlushTarget>,
    width: u32,
    height: u32,
    fps: u32,
    duration_ms: u32,
    frames: Vec<(Bytes, Arc<Palette>)>,
    buffered_bytes: usize,
    output: Option<Vec<u8>>,
    summary: Option<ContainerSummary>,
}

impl WebpWriter {
    pub fn create<P: AsRef<Path>>(path: P, width: u32, height: u32, fps: u32) -> Result<Self, RecorderError> {
        check_dimensions(width, height, fps, MAX_DIMENSION)?;
        let target = FlushTarget::reserve(path.as_ref())?;
        let mut writer = Self::in_memory(width, height, fps)?;
        writer.target = Some(target);
        Ok(writer)
    }

    pub fn in_memory(width: u32, height: u32, fps: u32) -> Result<Self, RecorderError> {
        check_dimensions(width, height, fps, MAX_DIMENSION)?;
        Ok(Self {
            target: None,
            width,
            height,
            fps,
            duration_ms: webp_duration_millis(fps).min(MAX_DURATION_MS),
            frames: Vec::new(),
            buffered_bytes: 0,
            output: None,
            summary: None,
        })
    }

    /// Per-frame duration in milliseconds
    pub fn frame_duration_ms(&self) -> u32 {
        self.duration_ms
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buffered_bytes
    }

    pub fn output(&self) -> Option<&[u8]> {
        self.output.as_deref()
    }

    pub fn serialize(&self) -> Result<Vec<u8>, RecorderError> {
        let mut body = Vec::new();
        put_fourcc(&mut body, b"WEBP");

        let mut vp8x = Vec::with_capacity(10);
        vp8x.push(VP8X_FLAG_ALPHA | VP8X_FLAG_ANIMATION);
        vp8x.extend_from_slice(&[0, 0, 0]);
        put_u24(&mut vp8x, self.width - 1);
        put_u24(&mut vp8x, self.height - 1);
        put_chunk(&mut body, b"VP8X", &vp8x);

        let mut anim = Vec::with_capacity(6);
        put_u32(&mut anim, BACKGROUND_COLOR);
        put_u16(&mut anim, LOOP_FOREVER);
        put_chunk(&mut body, b"ANIM", &anim);

        for (indices, palette) in &self.frames {
            let rgba = indexed_to_rgba(indices, palette);
            let bitstream = encode_vp8l(&rgba, self.width, self.height)?;

            let mut anmf = Vec::with_capacity(16 + 8 + bitstream.len() + 1);
            put_u24(&mut anmf, 0); // x offset / 2
            put_u24(&mut anmf, 0); // y offset / 2
            put_u24(&mut anmf, self.width - 1);
            put_u24(&mut anmf, self.height - 1);
            put_u24(&mut anmf, self.duration_ms);
            anmf.push(ANMF_FLAG_NO_BLEND);
            put_chunk(&mut anmf, b"VP8L", &bitstream);
            put_chunk(&mut body, b"ANMF", &anmf);
        }

        let mut out = Vec::with_capacity(body.len() + 8);
        put_fourcc(&mut out, b"RIFF");
        put_u32(&mut out, body.len() as u32);
        out.extend_from_slice(&body);
        Ok(out)
    }
}

/// Lossless-compress one RGBA frame and return its bare `VP8L` payload
fn encode_vp8l(rgba: &[u8], width: u32, height: u32) -> Result<Vec<u8>, RecorderError> {
    let mut still = Vec::new();
    WebPEncoder::new_lossless(&mut still)
        .encode(rgba, width, height, ExtendedColorType::Rgba8)
        .map_err(|e| RecorderError::EncodingError(format!("WebP encoding failed: {}", e)))?;

    find_chunk(&still, b"VP8L")
        .map(|payload| payload.to_vec())
        .ok_or_else(|| RecorderError::EncodingError("WebP encoder produced no VP8L chunk".to_string()))
}

impl ContainerWriter for WebpWriter {
    fn append_frame(&mut self, frame: EncodedFrame) -> Result<(), RecorderError> {
        if self.summary.is_some() {
            return Err(RecorderError::SessionClosed);
        }
        let palette = match frame.kind {
            FrameKind::Indexed {
                width,
                height,
                palette,
            } if width == self.width && height == self.height => palette,
            FrameKind::Indexed { width, height, .. } => {
                return Err(RecorderError::EncodingError(format!(
                    "indexed frame {}x{} does not match WebP canvas {}x{}",
                    width, height, self.width, self.height
                )))
            }
            FrameKind::Jpeg { .. } => {
                return Err(RecorderError::MuxingError(
                    "WebP writer only accepts indexed frames".to_string(),
                ))
            }
        };
        let pixels = self.width as usize * self.height as usize;
        if frame.payload.len() != pixels {
            return Err(RecorderError::EncodingError(format!(
                "indexed frame holds {} pixels, expected {}",
                frame.payload.len(),
                pixels
            )));
        }

        self.buffered_bytes += frame.payload.len();
        self.frames.push((frame.payload, palette));
        Ok(())
    }

    fn finalize(&mut self) -> Result<ContainerSummary, RecorderError> {
        if let Some(summary) = &self.summary {
            return Ok(summary.clone());
        }

        let bytes_written = if self.frames.is_empty() {
            // An animation needs at least one frame; leave no file behind.
            if let Some(target) = self.target.take() {
                log::info!("No frames recorded, not writing {:?}", target.path());
            }
            0
        } else {
            let bytes = self.serialize()?;
            match self.target.as_mut() {
                Some(target) => {
                    let written = target.commit(&bytes)?;
                    log::debug!("Wrote {} WebP frames to {:?}", self.frames.len(), target.path());
                    written
                }
                None => {
                    let len = bytes.len() as u64;
                    self.output = Some(bytes);
                    len
                }
            }
        };

        let frames = self.frames.len() as u64;
        self.frames.clear();
        self.buffered_bytes = 0;

        let summary = ContainerSummary {
            format: ContainerFormat::Webp,
            frames,
            bytes_written,
            duration_secs: media_duration_secs(frames, self.fps),
        };
        self.summary = Some(summary.clone());
        Ok(summary)
    }

    fn frame_count(&self) -> u64 {
        match &self.summary {
            Some(summary) => summary.frames,
            None => self.frames.len() as u64,
        }
    }

    fn format(&self) -> ContainerFormat {
        ContainerFormat::Webp
    }

    fn is_finalized(&self) -> bool {
        self.summary.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::container::riff::{chunks, read_u24, read_u32};
    use crate::recording::encoder::PaletteQuantizer;
    use crate::types::RawFrame;

    fn indexed(width: u32, height: u32, rgba: [u8; 4]) -> EncodedFrame {
        PaletteQuantizer::new(width, height, Palette::shared_plan9())
            .quantize(&RawFrame::solid(width, height, rgba))
            .unwrap()
    }

    /// Rebuild a still WebP from one ANMF chunk so `image` can decode it
    fn still_from_anmf(anmf: &[u8]) -> Vec<u8> {
        let vp8l = chunks(anmf, 16)
            .find(|c| &c.tag == b"VP8L")
            .expect("ANMF wraps a VP8L chunk");
        let mut body = Vec::new();
        put_fourcc(&mut body, b"WEBP");
        put_chunk(&mut body, b"VP8L", vp8l.payload);
        let mut out = Vec::new();
        put_fourcc(&mut out, b"RIFF");
        put_u32(&mut out, body.len() as u32);
        out.extend_from_slice(&body);
        out
    }

    #[test]
    fn test_serialize_layout() {
        let mut writer = WebpWriter::in_memory(10, 6, 30).unwrap();
        for _ in 0..3 {
            writer.append_frame(indexed(10, 6, [0, 0, 255, 255])).unwrap();
        }
        writer.finalize().unwrap();
        let bytes = writer.output().unwrap();

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(read_u32(bytes, 4), Some(bytes.len() as u32 - 8));
        assert_eq!(&bytes[8..12], b"WEBP");

        let top: Vec<_> = chunks(bytes, 12).collect();
        assert_eq!(&top[0].tag, b"VP8X");
        assert_eq!(top[0].payload[0], VP8X_FLAG_ALPHA | VP8X_FLAG_ANIMATION);
        assert_eq!(read_u24(top[0].payload, 4), Some(9));
        assert_eq!(read_u24(top[0].payload, 7), Some(5));

        assert_eq!(&top[1].tag, b"ANIM");
        assert_eq!(top[1].payload, &[0, 0, 0, 0, 0, 0]);

        let frames: Vec<_> = top.iter().filter(|c| &c.tag == b"ANMF").collect();
        assert_eq!(frames.len(), 3);
        for f in frames {
            assert_eq!(read_u24(f.payload, 12), Some(33), "duration in ms");
            assert_eq!(f.payload[15], ANMF_FLAG_NO_BLEND);
        }
    }

    #[test]
    fn test_frame_decodes_within_palette_distance() {
        let palette = Palette::shared_plan9();
        let color = [250, 120, 10];
        let mut writer = WebpWriter::in_memory(6, 6, 30).unwrap();
        writer
            .append_frame(indexed(6, 6, [color[0], color[1], color[2], 255]))
            .unwrap();
        writer.finalize().unwrap();
        let bytes = writer.output().unwrap();

        let anmf = chunks(bytes, 12).find(|c| &c.tag == b"ANMF").unwrap();
        let still = still_from_anmf(anmf.payload);
        let decoded = image::load_from_memory_with_format(&still, image::ImageFormat::WebP)
            .expect("frame bitstream decodes")
            .to_rgba8();
        assert_eq!(decoded.dimensions(), (6, 6));

        let px = decoded.get_pixel(3, 3).0;
        assert_eq!(px[3], 255);
        assert_eq!(
            crate::recording::palette::distance_sq([px[0], px[1], px[2]], color),
            palette.nearest_distance_sq(color)
        );
    }

    #[test]
    fn test_finalize_idempotent_and_closed() {
        let mut writer = WebpWriter::in_memory(2, 2, 30).unwrap();
        writer.append_frame(indexed(2, 2, [1, 1, 1, 255])).unwrap();
        let a = writer.finalize().unwrap();
        assert_eq!(writer.finalize().unwrap(), a);
        assert!(matches!(
            writer.append_frame(indexed(2, 2, [1, 1, 1, 255])),
            Err(RecorderError::SessionClosed)
        ));
    }

    #[test]
    fn test_rejects_jpeg_frames() {
        let mut writer = WebpWriter::in_memory(2, 2, 30).unwrap();
        let jpeg = EncodedFrame {
            payload: Bytes::from_static(&[0xFF, 0xD8]),
            kind: FrameKind::Jpeg { width: 2, height: 2 },
        };
        assert!(matches!(writer.append_frame(jpeg), Err(RecorderError::MuxingError(_))));
    }

    #[test]
    fn test_empty_recording_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.webp");
        let mut writer = WebpWriter::create(&path, 8, 8, 30).unwrap();
        let summary = writer.finalize().unwrap();
        assert_eq!(summary.frames, 0);
        assert_eq!(summary.bytes_written, 0);
        assert!(!path.exists());
        assert!(!dir.path().join("empty.webp.partial").exists());

        let mut writer = WebpWriter::in_memory(8, 8, 30).unwrap();
        writer.finalize().unwrap();
        assert!(writer.output().is_none());
    }

    #[test]
    fn test_create_writes_file_on_finalize() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.webp");
        let mut writer = WebpWriter::create(&path, 4, 4, 20).unwrap();
        assert_eq!(writer.frame_duration_ms(), 50);
        writer.append_frame(indexed(4, 4, [0, 0, 0, 255])).unwrap();
        let summary = writer.finalize().unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), summary.bytes_written);
    }
}
