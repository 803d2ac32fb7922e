use serde::{Deserialize, Serialize};
use std::path::Path;

/// Raw interleaved RGBA pixels read back from a render surface
///
/// `pixels` holds `stride * height` bytes; each row starts at a multiple of
/// `stride` and its first `4 * width` bytes are the visible pixels.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub pixels: Vec<u8>,
}

impl RawFrame {
    /// Wrap a tightly packed RGBA buffer
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            stride: width as usize * 4,
            pixels,
        }
    }

    pub fn with_stride(width: u32, height: u32, stride: usize, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            stride,
            pixels,
        }
    }

    /// Frame filled with a single RGBA color
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::new(width, height, pixels)
    }

    /// Bytes of visible pixels in one row
    pub fn row_bytes(&self) -> usize {
        self.width as usize * 4
    }

    /// Visible pixels of row `y`
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.pixels[start..start + self.row_bytes()]
    }

    pub fn is_packed(&self) -> bool {
        self.stride == self.row_bytes()
    }

    /// Check that the buffer matches the declared geometry
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!("zero-size frame {}x{}", self.width, self.height));
        }
        if self.stride < self.row_bytes() {
            return Err(format!(
                "row stride {} is smaller than {} bytes per row",
                self.stride,
                self.row_bytes()
            ));
        }
        let required = self.stride * (self.height as usize - 1) + self.row_bytes();
        if self.pixels.len() < required {
            return Err(format!(
                "pixel buffer holds {} bytes, {}x{} with stride {} needs {}",
                self.pixels.len(),
                self.width,
                self.height,
                self.stride,
                required
            ));
        }
        Ok(())
    }
}

/// Output container and the codec that feeds it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    /// Motion-JPEG frames in an AVI/RIFF container
    Avi,
    /// Palette-indexed animated GIF
    Gif,
    /// Lossless animated WebP built from palette-indexed frames
    Webp,
}

impl ContainerFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ContainerFormat::Avi => "avi",
            ContainerFormat::Gif => "gif",
            ContainerFormat::Webp => "webp",
        }
    }

    pub fn default_file_name(&self) -> String {
        format!("recording.{}", self.extension())
    }

    /// Infer the format from a file extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        Self::parse(&ext)
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "avi" | "mjpeg" | "mjpg" => Some(ContainerFormat::Avi),
            "gif" => Some(ContainerFormat::Gif),
            "webp" => Some(ContainerFormat::Webp),
            _ => None,
        }
    }

    /// Whether frames go through the palette quantizer
    pub fn is_indexed(&self) -> bool {
        !matches!(self, ContainerFormat::Avi)
    }

    pub fn as_str(&self) -> &'static str {
        self.extension()
    }
}

impl Default for ContainerFormat {
    fn default() -> Self {
        ContainerFormat::Avi
    }
}

impl std::fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
