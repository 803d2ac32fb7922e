//! Motion-JPEG in AVI/RIFF
//!
//! Layout written by this module:
//!
//! ```text
//! RIFF 'AVI '
//!   LIST 'hdrl'
//!     avih            main header, frame count patched on finalize
//!     LIST 'strl'
//!       strh 'vids'   'MJPG' handler, length patched on finalize
//!       strf          BITMAPINFOHEADER, compression 'MJPG'
//!   LIST 'movi'
//!     00dc ...        one chunk per JPEG frame
//!   idx1              (offset, size) per frame, offsets relative to 'movi'
//! ```

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use super::riff::{padded_chunk_len, patch_u32, put_fourcc, put_i16, put_u16, put_u32};
use super::{check_dimensions, create_file, ContainerSummary, ContainerWriter, UnfinishedFile};
use crate::errors::RecorderError;
use crate::recording::encoder::{EncodedFrame, FrameKind};
use crate::timing::{avi_micros_per_frame, media_duration_secs};
use crate::types::ContainerFormat;

const AVIF_HASINDEX: u32 = 0x10;
const AVIIF_KEYFRAME: u32 = 0x10;
const FRAME_CHUNK: &[u8; 4] = b"00dc";
const MAX_DIMENSION: u32 = i16::MAX as u32;

/// File offsets of the header fields that are only known on finalize
#[derive(Debug, Clone, Copy, Default)]
struct Placeholders {
    riff_size: u64,
    avih_max_bytes_per_sec: u64,
    avih_total_frames: u64,
    avih_suggested_buffer: u64,
    strh_length: u64,
    strh_suggested_buffer: u64,
    movi_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Offset of the chunk tag, relative to the 'movi' fourcc
    pub offset: u32,
    /// Payload size without header or padding
    pub size: u32,
}

/// Streaming MJPEG/AVI writer over any seekable sink
pub struct AviWriter<W: Write + Seek> {
    inner: W,
    width: u32,
    height: u32,
    fps: u32,
    placeholders: Placeholders,
    /// Absolute position of the 'movi' fourcc
    movi_start: u64,
    /// Absolute position of the next byte to write
    position: u64,
    index: Vec<IndexEntry>,
    max_frame_size: u32,
    /// Set once a write failed part-way; the stream can no longer be finalized
    poisoned: bool,
    summary: Option<ContainerSummary>,
    /// File-backed writers remove their output unless finalized
    unfinished: Option<UnfinishedFile>,
}

impl AviWriter<BufWriter<File>> {
    /// Create `path` and write the provisional header
    pub fn create<P: AsRef<Path>>(path: P, width: u32, height: u32, fps: u32) -> Result<Self, RecorderError> {
        check_dimensions(width, height, fps, MAX_DIMENSION)?;
        let unfinished = UnfinishedFile::new(path.as_ref());
        let file = create_file(path.as_ref())?;
        let mut writer = Self::new(file, width, height, fps)?;
        writer.unfinished = Some(unfinished);
        Ok(writer)
    }
}

impl<W: Write + Seek> AviWriter<W> {
    /// Write the provisional header to `inner`, which must be positioned at
    /// its start.
    pub fn new(mut inner: W, width: u32, height: u32, fps: u32) -> Result<Self, RecorderError> {
        check_dimensions(width, height, fps, MAX_DIMENSION)?;

        let (header, placeholders) = build_header(width, height, fps);
        inner
            .write_all(&header)
            .map_err(|e| RecorderError::IoError(format!("Failed to write AVI header: {}", e)))?;

        let position = header.len() as u64;
        Ok(Self {
            inner,
            width,
            height,
            fps,
            placeholders,
            movi_start: position - 4,
            position,
            index: Vec::new(),
            max_frame_size: 0,
            poisoned: false,
            summary: None,
            unfinished: None,
        })
    }

    pub fn index(&self) -> &[IndexEntry] {
        &self.index
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        let Self {
            inner, unfinished, ..
        } = self;
        if let Some(mut unfinished) = unfinished {
            unfinished.keep();
        }
        inner
    }

    fn write_chunk(&mut self, payload: &[u8]) -> Result<(), RecorderError> {
        if self.poisoned {
            return Err(RecorderError::IoError(
                "AVI stream is incomplete after an earlier write error".to_string(),
            ));
        }
        let size = u32::try_from(payload.len())
            .map_err(|_| RecorderError::MuxingError("frame larger than 4 GiB".to_string()))?;
        let chunk_len = padded_chunk_len(payload.len()) as u64;
        // idx1 adds 16 bytes per frame and the RIFF size field is 32 bits.
        let projected = self.position + chunk_len + 8 + 16 * (self.index.len() as u64 + 1);
        if projected > u32::MAX as u64 {
            return Err(RecorderError::MuxingError(
                "AVI file would exceed the 4 GiB RIFF limit".to_string(),
            ));
        }

        let offset = (self.position - self.movi_start) as u32;
        if let Some(last) = self.index.last() {
            debug_assert_eq!(
                offset as usize,
                last.offset as usize + padded_chunk_len(last.size as usize),
                "index offsets must follow chunk sizes"
            );
        }

        let mut header = Vec::with_capacity(8);
        put_fourcc(&mut header, FRAME_CHUNK);
        put_u32(&mut header, size);
        let pad: &[u8] = if size % 2 == 1 { &[0] } else { &[] };
        let written = self
            .inner
            .write_all(&header)
            .and_then(|_| self.inner.write_all(payload))
            .and_then(|_| self.inner.write_all(pad));
        if let Err(e) = written {
            self.poisoned = true;
            return Err(RecorderError::IoError(format!("Failed to write AVI frame: {}", e)));
        }

        self.position += chunk_len;
        self.index.push(IndexEntry { offset, size });
        self.max_frame_size = self.max_frame_size.max(size);
        Ok(())
    }

    fn write_index_and_patch(&mut self) -> Result<u64, RecorderError> {
        let movi_end = self.position;

        let mut idx1 = Vec::with_capacity(8 + self.index.len() * 16);
        put_fourcc(&mut idx1, b"idx1");
        put_u32(&mut idx1, (self.index.len() * 16) as u32);
        for entry in &self.index {
            put_fourcc(&mut idx1, FRAME_CHUNK);
            put_u32(&mut idx1, AVIIF_KEYFRAME);
            put_u32(&mut idx1, entry.offset);
            put_u32(&mut idx1, entry.size);
        }
        self.inner.write_all(&idx1)?;
        let total_len = movi_end + idx1.len() as u64;

        let frames = self.index.len() as u32;
        let suggested_buffer = self.max_frame_size.saturating_add(8);
        let p = self.placeholders;
        let patches = [
            (p.riff_size, (total_len - 8) as u32),
            (p.avih_max_bytes_per_sec, self.max_frame_size.saturating_mul(self.fps)),
            (p.avih_total_frames, frames),
            (p.avih_suggested_buffer, suggested_buffer),
            (p.strh_length, frames),
            (p.strh_suggested_buffer, suggested_buffer),
            (p.movi_size, (movi_end - self.movi_start) as u32),
        ];
        for (offset, value) in patches {
            self.inner.seek(SeekFrom::Start(offset))?;
            self.inner.write_all(&value.to_le_bytes())?;
        }
        self.inner.seek(SeekFrom::Start(total_len))?;
        self.inner.flush()?;

        self.position = total_len;
        Ok(total_len)
    }
}

impl<W: Write + Seek + Send> ContainerWriter for AviWriter<W> {
    fn append_frame(&mut self, frame: EncodedFrame) -> Result<(), RecorderError> {
        if self.summary.is_some() {
            return Err(RecorderError::SessionClosed);
        }
        match frame.kind {
            FrameKind::Jpeg { width, height } if width == self.width && height == self.height => {}
            FrameKind::Jpeg { width, height } => {
                return Err(RecorderError::EncodingError(format!(
                    "JPEG frame {}x{} does not match AVI stream {}x{}",
                    width, height, self.width, self.height
                )))
            }
            FrameKind::Indexed { .. } => {
                return Err(RecorderError::MuxingError(
                    "AVI stream only accepts JPEG frames".to_string(),
                ))
            }
        }
        self.write_chunk(&frame.payload)
    }

    fn finalize(&mut self) -> Result<ContainerSummary, RecorderError> {
        if let Some(summary) = &self.summary {
            return Ok(summary.clone());
        }
        if self.poisoned {
            return Err(RecorderError::IoError(
                "AVI stream is incomplete after an earlier write error".to_string(),
            ));
        }
        let bytes_written = self.write_index_and_patch().map_err(|e| {
            self.poisoned = true;
            RecorderError::IoError(format!("Failed to finalize AVI: {}", e))
        })?;
        if let Some(unfinished) = self.unfinished.as_mut() {
            unfinished.keep();
        }

        let frames = self.index.len() as u64;
        let summary = ContainerSummary {
            format: ContainerFormat::Avi,
            frames,
            bytes_written,
            duration_secs: media_duration_secs(frames, self.fps),
        };
        self.summary = Some(summary.clone());
        Ok(summary)
    }

    fn frame_count(&self) -> u64 {
        self.index.len() as u64
    }

    fn format(&self) -> ContainerFormat {
        ContainerFormat::Avi
    }

    fn is_finalized(&self) -> bool {
        self.summary.is_some()
    }
}

/// Header bytes up to and including the 'movi' fourcc
fn build_header(width: u32, height: u32, fps: u32) -> (Vec<u8>, Placeholders) {
    let mut b = Vec::with_capacity(224);
    let mut p = Placeholders::default();

    put_fourcc(&mut b, b"RIFF");
    p.riff_size = b.len() as u64;
    put_u32(&mut b, 0);
    put_fourcc(&mut b, b"AVI ");

    put_fourcc(&mut b, b"LIST");
    let hdrl_size_at = b.len();
    put_u32(&mut b, 0);
    put_fourcc(&mut b, b"hdrl");

    // avih: MainAVIHeader
    put_fourcc(&mut b, b"avih");
    put_u32(&mut b, 56);
    put_u32(&mut b, avi_micros_per_frame(fps));
    p.avih_max_bytes_per_sec = b.len() as u64;
    put_u32(&mut b, 0);
    put_u32(&mut b, 0); // padding granularity
    put_u32(&mut b, AVIF_HASINDEX);
    p.avih_total_frames = b.len() as u64;
    put_u32(&mut b, 0);
    put_u32(&mut b, 0); // initial frames
    put_u32(&mut b, 1); // streams
    p.avih_suggested_buffer = b.len() as u64;
    put_u32(&mut b, 0);
    put_u32(&mut b, width);
    put_u32(&mut b, height);
    for _ in 0..4 {
        put_u32(&mut b, 0);
    }

    put_fourcc(&mut b, b"LIST");
    let strl_size_at = b.len();
    put_u32(&mut b, 0);
    put_fourcc(&mut b, b"strl");

    // strh: AVIStreamHeader
    put_fourcc(&mut b, b"strh");
    put_u32(&mut b, 56);
    put_fourcc(&mut b, b"vids");
    put_fourcc(&mut b, b"MJPG");
    put_u32(&mut b, 0); // flags
    put_u16(&mut b, 0); // priority
    put_u16(&mut b, 0); // language
    put_u32(&mut b, 0); // initial frames
    put_u32(&mut b, 1); // scale
    put_u32(&mut b, fps); // rate
    put_u32(&mut b, 0); // start
    p.strh_length = b.len() as u64;
    put_u32(&mut b, 0);
    p.strh_suggested_buffer = b.len() as u64;
    put_u32(&mut b, 0);
    put_u32(&mut b, u32::MAX); // quality: driver default
    put_u32(&mut b, 0); // sample size
    put_i16(&mut b, 0);
    put_i16(&mut b, 0);
    put_i16(&mut b, width as i16);
    put_i16(&mut b, height as i16);

    // strf: BITMAPINFOHEADER
    put_fourcc(&mut b, b"strf");
    put_u32(&mut b, 40);
    put_u32(&mut b, 40);
    put_u32(&mut b, width);
    put_u32(&mut b, height);
    put_u16(&mut b, 1); // planes
    put_u16(&mut b, 24); // bit count
    put_fourcc(&mut b, b"MJPG");
    put_u32(&mut b, width * height * 3);
    for _ in 0..4 {
        put_u32(&mut b, 0);
    }

    let hdrl_end = b.len();
    patch_u32(&mut b, hdrl_size_at, (hdrl_end - hdrl_size_at - 4) as u32);
    patch_u32(&mut b, strl_size_at, (hdrl_end - strl_size_at - 4) as u32);

    put_fourcc(&mut b, b"LIST");
    p.movi_size = b.len() as u64;
    put_u32(&mut b, 0);
    put_fourcc(&mut b, b"movi");

    (b, p)
}
