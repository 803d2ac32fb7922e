//! Container writers
//!
//! AVI is written as a stream: the header goes out on open with placeholder
//! counts and is patched in place on finalize. GIF and WebP keep the whole
//! frame list in memory and serialize it in one pass on finalize, so their
//! memory use grows with every appended frame.

mod avi;
mod gif;
pub(crate) mod riff;
mod webp;

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::encoder::EncodedFrame;
use super::palette::Palette;
use crate::errors::RecorderError;
use crate::types::ContainerFormat;

pub use self::avi::{AviWriter, IndexEntry};
pub use self::gif::GifWriter;
pub use self::webp::WebpWriter;

/// Totals reported once a container is finalized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub format: ContainerFormat,
    pub frames: u64,
    pub bytes_written: u64,
    pub duration_secs: f64,
}

/// Sink for encoded frames of one recording
pub trait ContainerWriter: Send {
    /// Append the next frame; fails with `SessionClosed` after finalize.
    fn append_frame(&mut self, frame: EncodedFrame) -> Result<(), RecorderError>;

    /// Write trailing metadata and flush. Calling it again returns the
    /// first summary without touching the output.
    fn finalize(&mut self) -> Result<ContainerSummary, RecorderError>;

    fn frame_count(&self) -> u64;

    fn format(&self) -> ContainerFormat;

    fn is_finalized(&self) -> bool;
}

/// Open the writer for `format` at `path`
pub fn open_writer(
    format: ContainerFormat,
    path: &Path,
    width: u32,
    height: u32,
    fps: u32,
    palette: Arc<Palette>,
) -> Result<Box<dyn ContainerWriter>, RecorderError> {
    ensure_parent_dir(path)?;
    let writer: Box<dyn ContainerWriter> = match format {
        ContainerFormat::Avi => Box::new(AviWriter::create(path, width, height, fps)?),
        ContainerFormat::Gif => Box::new(GifWriter::create(path, width, height, fps, palette)?),
        ContainerFormat::Webp => Box::new(WebpWriter::create(path, width, height, fps)?),
    };
    log::debug!("Opened {} writer at {:?} ({}x{} @ {}fps)", format, path, width, height, fps);
    Ok(writer)
}

/// Buffered file handle for streaming writers
pub(crate) fn create_file(path: &Path) -> Result<BufWriter<File>, RecorderError> {
    let file = File::create(path)
        .map_err(|e| RecorderError::IoError(format!("Failed to create output file {:?}: {}", path, e)))?;
    Ok(BufWriter::new(file))
}

fn ensure_parent_dir(path: &Path) -> Result<(), RecorderError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                RecorderError::IoError(format!("Failed to create output directory {:?}: {}", parent, e))
            })?;
        }
    }
    Ok(())
}

pub(crate) fn check_dimensions(width: u32, height: u32, fps: u32, max: u32) -> Result<(), RecorderError> {
    if width == 0 || height == 0 {
        return Err(RecorderError::InvalidConfig(format!(
            "recording dimensions must be non-zero, got {}x{}",
            width, height
        )));
    }
    if width > max || height > max {
        return Err(RecorderError::InvalidConfig(format!(
            "recording dimensions {}x{} exceed the container limit of {}",
            width, height, max
        )));
    }
    if fps == 0 {
        return Err(RecorderError::InvalidConfig("fps must be at least 1".to_string()));
    }
    Ok(())
}

/// Output reserved on open and replaced in one rename on commit
///
/// Reserving the file up front surfaces permission and path problems when
/// the recording starts instead of when it is saved. An uncommitted
/// reservation is removed on drop.
#[derive(Debug)]
pub(crate) struct FlushTarget {
    path: PathBuf,
    partial: PathBuf,
    committed: bool,
}

impl FlushTarget {
    pub(crate) fn reserve(path: &Path) -> Result<Self, RecorderError> {
        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".partial");
        let partial = path.with_file_name(name);

        File::create(&partial).map_err(|e| {
            RecorderError::IoError(format!("Failed to create output file {:?}: {}", partial, e))
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            partial,
            committed: false,
        })
    }

    pub(crate) fn commit(&mut self, bytes: &[u8]) -> Result<u64, RecorderError> {
        fs::write(&self.partial, bytes).map_err(|e| {
            RecorderError::IoError(format!("Failed to write {:?}: {}", self.partial, e))
        })?;
        fs::rename(&self.partial, &self.path).map_err(|e| {
            RecorderError::IoError(format!("Failed to move recording into {:?}: {}", self.path, e))
        })?;
        self.committed = true;
        Ok(bytes.len() as u64)
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FlushTarget {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.partial);
        }
    }
}

/// Streamed output that is deleted on drop unless kept
///
/// Declared after the writer's sink so the file is closed before removal.
#[derive(Debug)]
pub(crate) struct UnfinishedFile {
    path: PathBuf,
    keep: bool,
}

impl UnfinishedFile {
    pub(crate) fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            keep: false,
        }
    }

    pub(crate) fn keep(&mut self) {
        self.keep = true;
    }
}

impl Drop for UnfinishedFile {
    fn drop(&mut self) {
        if !self.keep && fs::remove_file(&self.path).is_ok() {
            log::warn!("Removed unfinished recording {:?}", self.path);
        }
    }
}
