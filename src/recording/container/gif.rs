//! Animated GIF, buffered in memory and written on finalize

use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;

use ::gif::{DisposalMethod, Encoder, Frame, Repeat};

use super::{check_dimensions, ContainerSummary, ContainerWriter, FlushTarget};
use crate::errors::RecorderError;
use crate::recording::encoder::{EncodedFrame, FrameKind};
use crate::recording::palette::Palette;
use crate::timing::{gif_delay_centis, media_duration_secs};
use crate::types::ContainerFormat;

const MAX_DIMENSION: u32 = u16::MAX as u32;

struct BufferedFrame {
    indices: bytes::Bytes,
    palette: Arc<Palette>,
}

pub struct GifWriter {
    target: Option<FlushTarget>,
    width: u16,
    height: u16,
    fps: u32,
    delay: u16,
    palette: Arc<Palette>,
    frames: Vec<BufferedFrame>,
    buffered_bytes: usize,
    output: Option<Vec<u8>>,
    summary: Option<ContainerSummary>,
}

impl GifWriter {
    /// Writer that saves to `path` on finalize
    pub fn create<P: AsRef<Path>>(
        path: P,
        width: u32,
        height: u32,
        fps: u32,
        palette: Arc<Palette>,
    ) -> Result<Self, RecorderError> {
        check_dimensions(width, height, fps, MAX_DIMENSION)?;
        let target = FlushTarget::reserve(path.as_ref())?;
        let mut writer = Self::in_memory(width, height, fps, palette)?;
        writer.target = Some(target);
        Ok(writer)
    }

    /// Writer that keeps the finished file in memory, see [`GifWriter::output`]
    pub fn in_memory(width: u32, height: u32, fps: u32, palette: Arc<Palette>) -> Result<Self, RecorderError> {
        check_dimensions(width, height, fps, MAX_DIMENSION)?;
        Ok(Self {
            target: None,
            width: width as u16,
            height: height as u16,
            fps,
            delay: gif_delay_centis(fps),
            palette,
            frames: Vec::new(),
            buffered_bytes: 0,
            output: None,
            summary: None,
        })
    }

    /// Frame delay in centiseconds
    pub fn delay(&self) -> u16 {
        self.delay
    }

    /// Bytes of indexed pixels held until finalize
    pub fn buffered_bytes(&self) -> usize {
        self.buffered_bytes
    }

    /// Finished file of an in-memory writer
    pub fn output(&self) -> Option<&[u8]> {
        self.output.as_deref()
    }

    /// Encode every buffered frame into a complete GIF file
    pub fn serialize(&self) -> Result<Vec<u8>, RecorderError> {
        let err = |e: ::gif::EncodingError| RecorderError::MuxingError(format!("GIF encoding failed: {}", e));

        let global = self.palette.rgb_table();
        let mut out = Vec::with_capacity(self.buffered_bytes / 2 + 1024);
        let mut encoder = Encoder::new(&mut out, self.width, self.height, &global).map_err(err)?;
        encoder.set_repeat(Repeat::Infinite).map_err(err)?;

        for buffered in &self.frames {
            let local_palette = if Arc::ptr_eq(&buffered.palette, &self.palette)
                || *buffered.palette == *self.palette
            {
                None
            } else {
                Some(buffered.palette.rgb_table())
            };
            let frame = Frame {
                width: self.width,
                height: self.height,
                delay: self.delay,
                dispose: DisposalMethod::Keep,
                transparent: None,
                palette: local_palette,
                buffer: Cow::Borrowed(&buffered.indices[..]),
                ..Frame::default()
            };
            encoder.write_frame(&frame).map_err(err)?;
        }

        encoder
            .into_inner()
            .map_err(|e| RecorderError::MuxingError(format!("GIF trailer failed: {}", e)))?;
        Ok(out)
    }
}

impl ContainerWriter for GifWriter {
    fn append_frame(&mut self, frame: EncodedFrame) -> Result<(), RecorderError> {
        if self.summary.is_some() {
            return Err(RecorderError::SessionClosed);
        }
        let palette = match frame.kind {
            FrameKind::Indexed {
                width,
                height,
                palette,
            } => {
                if width != self.width as u32 || height != self.height as u32 {
                    return Err(RecorderError::EncodingError(format!(
                        "indexed frame {}x{} does not match GIF canvas {}x{}",
                        width, height, self.width, self.height
                    )));
                }
                palette
            }
            FrameKind::Jpeg { .. } => {
                return Err(RecorderError::MuxingError(
                    "GIF writer only accepts indexed frames".to_string(),
                ))
            }
        };
        if frame.payload.len() != self.width as usize * self.height as usize {
            return Err(RecorderError::EncodingError(format!(
                "indexed frame holds {} pixels, expected {}",
                frame.payload.len(),
                self.width as usize * self.height as usize
            )));
        }

        self.buffered_bytes += frame.payload.len();
        self.frames.push(BufferedFrame {
            indices: frame.payload,
            palette,
        });
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
                    log::debug!("Wrote {} GIF frames to {:?}", self.frames.len(), target.path());
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
        // The encoded file is the only copy we need from here on.
        self.frames.clear();
        self.buffered_bytes = 0;

        let summary = ContainerSummary {
            format: ContainerFormat::Gif,
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
        ContainerFormat::Gif
    }

    fn is_finalized(&self) -> bool {
        self.summary.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::encoder::PaletteQuantizer;
    use crate::types::RawFrame;
    use std::io::Cursor;

    fn indexed(width: u32, height: u32, rgba: [u8; 4]) -> EncodedFrame {
        PaletteQuantizer::new(width, height, Palette::shared_plan9())
            .quantize(&RawFrame::solid(width, height, rgba))
            .unwrap()
    }

    fn decode(bytes: &[u8]) -> Vec<(u16, Vec<u8>)> {
        let mut options = ::gif::DecodeOptions::new();
        options.set_color_output(::gif::ColorOutput::RGBA);
        let mut decoder = options.read_info(Cursor::new(bytes)).expect("valid GIF header");
        let mut frames = Vec::new();
        while let Some(frame) = decoder.read_next_frame().expect("valid GIF frame") {
            frames.push((frame.delay, frame.buffer.to_vec()));
        }
        frames
    }

    #[test]
    fn test_serialize_frames_and_delay() {
        let mut writer = GifWriter::in_memory(8, 6, 30, Palette::shared_plan9()).unwrap();
        for _ in 0..4 {
            writer.append_frame(indexed(8, 6, [255, 0, 0, 255])).unwrap();
        }
        let summary = writer.finalize().unwrap();
        assert_eq!(summary.frames, 4);

        let bytes = writer.output().unwrap();
        assert!(bytes.starts_with(b"GIF89a"));
        assert_eq!(bytes.last(), Some(&0x3B), "GIF trailer");

        let frames = decode(bytes);
        assert_eq!(frames.len(), 4);
        assert!(frames.iter().all(|(delay, _)| *delay == 3));
    }

    #[test]
    fn test_solid_color_roundtrip_within_palette_distance() {
        let palette = Palette::shared_plan9();
        let color = [30, 160, 220];
        let mut writer = GifWriter::in_memory(4, 4, 30, palette.clone()).unwrap();
        writer
            .append_frame(indexed(4, 4, [color[0], color[1], color[2], 255]))
            .unwrap();
        writer.finalize().unwrap();

        let frames = decode(writer.output().unwrap());
        let px = &frames[0].1[..4];
        assert_eq!(px[3], 255, "frames carry no transparency");
        assert_eq!(
            crate::recording::palette::distance_sq([px[0], px[1], px[2]], color),
            palette.nearest_distance_sq(color)
        );
    }

    #[test]
    fn test_loops_forever() {
        let mut writer = GifWriter::in_memory(2, 2, 10, Palette::shared_plan9()).unwrap();
        writer.append_frame(indexed(2, 2, [0, 0, 0, 255])).unwrap();
        writer.finalize().unwrap();
        let bytes = writer.output().unwrap();
        let netscape = bytes.windows(11).position(|w| w == b"NETSCAPE2.0");
        let at = netscape.expect("loop extension present") + 11;
        // sub-block: len 3, id 1, loop count 0 (infinite)
        assert_eq!(&bytes[at..at + 4], &[3, 1, 0, 0]);
    }

    #[test]
    fn test_finalize_idempotent_and_closed() {
        let mut writer = GifWriter::in_memory(2, 2, 30, Palette::shared_plan9()).unwrap();
        writer.append_frame(indexed(2, 2, [9, 9, 9, 255])).unwrap();
        let a = writer.finalize().unwrap();
        let b = writer.finalize().unwrap();
        assert_eq!(a, b);
        assert_eq!(writer.frame_count(), 1);
        assert!(matches!(
            writer.append_frame(indexed(2, 2, [9, 9, 9, 255])),
            Err(RecorderError::SessionClosed)
        ));
    }

    #[test]
    fn test_rejects_mismatched_frames() {
        let mut writer = GifWriter::in_memory(4, 4, 30, Palette::shared_plan9()).unwrap();
        assert!(writer.append_frame(indexed(2, 2, [0, 0, 0, 255])).is_err());
        assert_eq!(writer.frame_count(), 0);
        assert_eq!(writer.buffered_bytes(), 0);
    }

    #[test]
    fn test_empty_recording_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.gif");
        let mut writer = GifWriter::create(&path, 8, 8, 30, Palette::shared_plan9()).unwrap();
        let summary = writer.finalize().unwrap();
        assert_eq!(summary.frames, 0);
        assert_eq!(summary.bytes_written, 0);
        assert!(!path.exists());
        assert!(!dir.path().join("empty.gif.partial").exists());

        let mut writer = GifWriter::in_memory(8, 8, 30, Palette::shared_plan9()).unwrap();
        writer.finalize().unwrap();
        assert!(writer.output().is_none());
    }

    #[test]
    fn test_create_writes_file_on_finalize() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.gif");
        let mut writer = GifWriter::create(&path, 4, 4, 30, Palette::shared_plan9()).unwrap();
        writer.append_frame(indexed(4, 4, [0, 255, 0, 255])).unwrap();
        assert!(!path.exists(), "nothing is written before finalize");

        let summary = writer.finalize().unwrap();
        let on_disk = std::fs::read(&path).unwrap();
        assert_eq!(summary.bytes_written, on_disk.len() as u64);
        assert_eq!(decode(&on_disk).len(), 1);
    }
}
