//! Read back finished recordings
//!
//! Parses just enough of each container to report what a player would see:
//! canvas size, frame count and per-frame timing. Used by the
//! `framereel-probe` binary and by the tests to check written files.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::RecorderError;
use crate::recording::container::riff::{chunks, read_u16, read_u24, read_u32, Chunk};
use crate::types::ContainerFormat;

/// Summary of a container file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub format: ContainerFormat,
    pub width: u32,
    pub height: u32,
    /// Frames actually present in the file
    pub frame_count: u64,
    /// Frame count stored in the header (AVI `avih`), when there is one
    pub declared_frames: Option<u64>,
    /// Per-frame interval in microseconds, taken from the first frame
    pub frame_interval_us: u64,
    /// Entries in the AVI `idx1` chunk
    pub index_entries: Option<u64>,
    /// Loop count, 0 meaning forever
    pub loop_count: Option<u16>,
    /// Whether the trailing metadata was written
    pub finalized: bool,
    pub file_size: u64,
}

impl ContainerInfo {
    pub fn duration_secs(&self) -> f64 {
        self.frame_count as f64 * self.frame_interval_us as f64 / 1_000_000.0
    }

    pub fn nominal_fps(&self) -> f64 {
        if self.frame_interval_us == 0 {
            0.0
        } else {
            1_000_000.0 / self.frame_interval_us as f64
        }
    }
}

pub fn inspect_file<P: AsRef<Path>>(path: P) -> Result<ContainerInfo, RecorderError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .map_err(|e| RecorderError::IoError(format!("Failed to read {:?}: {}", path, e)))?;
    inspect_bytes(&bytes)
}

/// Detect the container from its magic bytes and inspect it
pub fn inspect_bytes(bytes: &[u8]) -> Result<ContainerInfo, RecorderError> {
    match detect_format(bytes) {
        Some(ContainerFormat::Avi) => inspect_avi(bytes),
        Some(ContainerFormat::Gif) => inspect_gif(bytes),
        Some(ContainerFormat::Webp) => inspect_webp(bytes),
        None => Err(invalid("unrecognized file signature")),
    }
}

pub fn detect_format(bytes: &[u8]) -> Option<ContainerFormat> {
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some(ContainerFormat::Gif);
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" {
        match &bytes[8..12] {
            b"AVI " => return Some(ContainerFormat::Avi),
            b"WEBP" => return Some(ContainerFormat::Webp),
            _ => {}
        }
    }
    None
}

fn invalid(msg: impl Into<String>) -> RecorderError {
    RecorderError::InvalidContainer(msg.into())
}

fn list_type(chunk: &Chunk<'_>) -> Option<[u8; 4]> {
    let t = chunk.payload.get(0..4)?;
    Some([t[0], t[1], t[2], t[3]])
}

fn riff_size_matches(bytes: &[u8]) -> bool {
    read_u32(bytes, 4).map_or(false, |size| size as u64 + 8 == bytes.len() as u64)
}

fn inspect_avi(bytes: &[u8]) -> Result<ContainerInfo, RecorderError> {
    let top: Vec<Chunk<'_>> = chunks(bytes, 12).collect();

    let hdrl = top
        .iter()
        .find(|c| &c.tag == b"LIST" && list_type(c) == Some(*b"hdrl"))
        .ok_or_else(|| invalid("AVI without hdrl list"))?;
    let avih = chunks(hdrl.payload, 4)
        .find(|c| &c.tag == b"avih")
        .ok_or_else(|| invalid("AVI without avih header"))?;
    let field = |offset| read_u32(avih.payload, offset).ok_or_else(|| invalid("truncated avih header"));
    let micros_per_frame = field(0)?;
    let declared_frames = field(16)?;
    let width = field(32)?;
    let height = field(36)?;

    // The movi size is only patched on finalize, so count frame chunks by
    // walking from the list body to the end of the file.
    let movi_at = bytes
        .windows(4)
        .enumerate()
        .skip(12)
        .find(|(i, w)| *w == b"movi" && bytes.get(i - 8..i - 4) == Some(&b"LIST"[..]))
        .map(|(i, _)| i)
        .ok_or_else(|| invalid("AVI without movi list"))?;
    let frame_count = chunks(bytes, movi_at + 4)
        .take_while(|c| &c.tag != b"idx1")
        .filter(|c| &c.tag == b"00dc")
        .count() as u64;

    let index_entries = top
        .iter()
        .find(|c| &c.tag == b"idx1")
        .map(|c| (c.payload.len() / 16) as u64);

    Ok(ContainerInfo {
        format: ContainerFormat::Avi,
        width,
        height,
        frame_count,
        declared_frames: Some(declared_frames as u64),
        frame_interval_us: micros_per_frame as u64,
        index_entries,
        loop_count: None,
        finalized: index_entries.is_some() && riff_size_matches(bytes),
        file_size: bytes.len() as u64,
    })
}

fn inspect_gif(bytes: &[u8]) -> Result<ContainerInfo, RecorderError> {
    let mut options = ::gif::DecodeOptions::new();
    options.set_color_output(::gif::ColorOutput::Indexed);
    let mut decoder = options
        .read_info(bytes)
        .map_err(|e| invalid(format!("GIF header: {}", e)))?;
    let width = decoder.width() as u32;
    let height = decoder.height() as u32;

    let mut frame_count = 0u64;
    let mut first_delay = None;
    while let Some(frame) = decoder
        .read_next_frame()
        .map_err(|e| invalid(format!("GIF frame {}: {}", frame_count, e)))?
    {
        first_delay.get_or_insert(frame.delay);
        frame_count += 1;
    }

    let loop_count = bytes
        .windows(11)
        .position(|w| w == b"NETSCAPE2.0")
        .and_then(|at| {
            let block = bytes.get(at + 11..at + 15)?;
            (block[0] == 3 && block[1] == 1).then(|| u16::from_le_bytes([block[2], block[3]]))
        });

    Ok(ContainerInfo {
        format: ContainerFormat::Gif,
        width,
        height,
        frame_count,
        declared_frames: None,
        frame_interval_us: first_delay.unwrap_or(0) as u64 * 10_000,
        index_entries: None,
        loop_count,
        finalized: bytes.last() == Some(&0x3B),
        file_size: bytes.len() as u64,
    })
}

fn inspect_webp(bytes: &[u8]) -> Result<ContainerInfo, RecorderError> {
    let mut info = ContainerInfo {
        format: ContainerFormat::Webp,
        width: 0,
        height: 0,
        frame_count: 0,
        declared_frames: None,
        frame_interval_us: 0,
        index_entries: None,
        loop_count: None,
        finalized: riff_size_matches(bytes),
        file_size: bytes.len() as u64,
    };

    for chunk in chunks(bytes, 12) {
        match &chunk.tag {
            b"VP8X" => {
                info.width = read_u24(chunk.payload, 4).ok_or_else(|| invalid("truncated VP8X"))? + 1;
                info.height = read_u24(chunk.payload, 7).ok_or_else(|| invalid("truncated VP8X"))? + 1;
            }
            b"ANIM" => {
                info.loop_count = Some(read_u16(chunk.payload, 4).ok_or_else(|| invalid("truncated ANIM"))?);
            }
            b"ANMF" => {
                if info.frame_count == 0 {
                    let ms = read_u24(chunk.payload, 12).ok_or_else(|| invalid("truncated ANMF"))?;
                    info.frame_interval_us = ms as u64 * 1000;
                }
                info.frame_count += 1;
            }
            b"VP8L" if info.frame_count == 0 && info.width == 0 => {
                // Still image: 0x2f signature, then 14-bit width-1 and height-1.
                let bits = read_u32(chunk.payload, 1).ok_or_else(|| invalid("truncated VP8L"))?;
                info.width = (bits & 0x3FFF) + 1;
                info.height = ((bits >> 14) & 0x3FFF) + 1;
                info.frame_count = 1;
            }
            _ => {}
        }
    }

    if info.width == 0 || info.height == 0 {
        return Err(invalid("WebP without a canvas size"));
    }
    Ok(info)
}
