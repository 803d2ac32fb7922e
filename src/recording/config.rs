//! Recording configuration types

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::encoder::{normalize_quality, DEFAULT_JPEG_QUALITY};
use crate::errors::RecorderError;
use crate::types::ContainerFormat;

pub const DEFAULT_MAX_FRAMES: u32 = 600;
pub const DEFAULT_FPS: u32 = 30;
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

/// Configuration for one recording session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Container to write
    pub format: ContainerFormat,
    /// Output file; `recording.<ext>` in the working directory when unset
    pub output_path: Option<PathBuf>,
    /// Frames after which the session stops itself, 0 means unbounded
    pub max_frames: u32,
    /// Nominal frame rate written into the container timing
    pub fps: u32,
    /// JPEG quality 1-100, 0 selects the default. Ignored by GIF and WebP.
    #[serde(deserialize_with = "deserialize_quality")]
    pub quality: u8,
    /// Encode on a background thread instead of the render thread
    pub async_encoding: bool,
    /// Frames the background encoder may hold before new ones are dropped
    pub queue_capacity: usize,
}

impl RecordingConfig {
    pub fn new(format: ContainerFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    /// Configuration whose format follows the output file extension
    pub fn for_output<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let format = ContainerFormat::from_path(&path).unwrap_or_default();
        Self {
            format,
            output_path: Some(path),
            ..Self::default()
        }
    }

    pub fn with_output_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn with_max_frames(mut self, max_frames: u32) -> Self {
        self.max_frames = max_frames;
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    /// Enable the background encoder with a queue of `capacity` frames
    pub fn with_async_encoding(mut self, capacity: usize) -> Self {
        self.async_encoding = true;
        self.queue_capacity = capacity;
        self
    }

    /// Output path with the per-format default filled in
    pub fn resolved_output_path(&self) -> PathBuf {
        self.output_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.format.default_file_name()))
    }

    /// Quality actually handed to the JPEG encoder
    pub fn effective_quality(&self) -> u8 {
        normalize_quality(self.quality)
    }

    pub fn is_bounded(&self) -> bool {
        self.max_frames > 0
    }

    pub fn validate(&self) -> Result<(), RecorderError> {
        if self.fps == 0 || self.fps > 1000 {
            return Err(RecorderError::InvalidConfig(format!(
                "fps must be between 1 and 1000, got {}",
                self.fps
            )));
        }
        if self.async_encoding && self.queue_capacity == 0 {
            return Err(RecorderError::InvalidConfig(
                "queue_capacity must be at least 1 when async encoding is enabled".to_string(),
            ));
        }
        if let Some(path) = &self.output_path {
            if path.as_os_str().is_empty() {
                return Err(RecorderError::InvalidConfig("output path is empty".to_string()));
            }
            if let Some(inferred) = ContainerFormat::from_path(path) {
                if inferred != self.format {
                    log::warn!(
                        "Output {:?} has a .{} extension but the format is {}",
                        path,
                        inferred.extension(),
                        self.format
                    );
                }
            }
        }
        Ok(())
    }
}

/// Fit a user-supplied quality into the stored range.
///
/// 0 stays 0 (use the default), anything else is clamped into 1..=100.
pub fn clamp_quality(raw: i64) -> u8 {
    match raw {
        0 => 0,
        q => q.clamp(1, 100) as u8,
    }
}

fn deserialize_quality<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    i64::deserialize(deserializer).map(clamp_quality)
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            format: ContainerFormat::default(),
            output_path: None,
            max_frames: DEFAULT_MAX_FRAMES,
            fps: DEFAULT_FPS,
            quality: DEFAULT_JPEG_QUALITY,
            async_encoding: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// `recording_20261014_153000.gif` style name next to `dir`
pub fn timestamped_output(dir: &Path, format: ContainerFormat, at: DateTime<Utc>) -> PathBuf {
    dir.join(format!(
        "recording_{}.{}",
        at.format("%Y%m%d_%H%M%S"),
        format.extension()
    ))
}

/// Statistics returned after finishing a recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingStats {
    /// Frames written into the container
    pub video_frames: u64,
    /// Frames the background encoder dropped because its queue was full
    pub dropped_frames: u64,
    /// Ticks whose frame failed to capture or encode
    pub skipped_frames: u64,
    /// Playback duration derived from frame count and fps
    pub duration_secs: f64,
    /// Wall-clock time between start and stop
    pub wall_clock_secs: f64,
    /// Total bytes written to file
    pub bytes_written: u64,
    /// Frames written per wall-clock second
    pub actual_fps: f64,
    /// Output file path
    pub output_path: String,
    pub format: ContainerFormat,
    pub started_at: Option<DateTime<Utc>>,
}

impl RecordingStats {
    /// Stats reported by a stop on an idle session
    pub fn empty(format: ContainerFormat, output_path: &Path) -> Self {
        Self {
            video_frames: 0,
            dropped_frames: 0,
            skipped_frames: 0,
            duration_secs: 0.0,
            wall_clock_secs: 0.0,
            bytes_written: 0,
            actual_fps: 0.0,
            output_path: output_path.to_string_lossy().to_string(),
            format,
            started_at: None,
        }
    }

    /// Calculate the average bitrate achieved
    pub fn avg_bitrate(&self) -> f64 {
        if self.duration_secs > 0.0 {
            (self.bytes_written as f64 * 8.0) / self.duration_secs
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_defaults() {
        let config = RecordingConfig::default();
        assert_eq!(config.format, ContainerFormat::Avi);
        assert_eq!(config.max_frames, 600);
        assert_eq!(config.fps, 30);
        assert_eq!(config.quality, 85);
        assert!(!config.async_encoding);
        assert_eq!(config.resolved_output_path(), PathBuf::from("recording.avi"));
    }

    #[test]
    fn test_for_output_infers_format() {
        let config = RecordingConfig::for_output("out/clip.webp");
        assert_eq!(config.format, ContainerFormat::Webp);
        assert_eq!(config.resolved_output_path(), PathBuf::from("out/clip.webp"));

        let unknown = RecordingConfig::for_output("clip.bin");
        assert_eq!(unknown.format, ContainerFormat::Avi);
    }

    #[test]
    fn test_builder_and_quality_policy() {
        let config = RecordingConfig::new(ContainerFormat::Gif)
            .with_max_frames(0)
            .with_fps(15)
            .with_quality(0);
        assert!(!config.is_bounded());
        assert_eq!(config.effective_quality(), 85);
        assert_eq!(config.with_quality(250).effective_quality(), 100);
    }

    #[test]
    fn test_out_of_range_quality_is_clamped() {
        assert_eq!(clamp_quality(0), 0);
        assert_eq!(clamp_quality(-5), 1);
        assert_eq!(clamp_quality(42), 42);
        assert_eq!(clamp_quality(300), 100);

        let config: RecordingConfig = toml::from_str("quality = 300\n").unwrap();
        assert_eq!(config.quality, 100);
        let config: RecordingConfig = toml::from_str("quality = -3\n").unwrap();
        assert_eq!(config.quality, 1);
    }

    #[test]
    fn test_validate() {
        assert!(RecordingConfig::default().validate().is_ok());
        assert!(RecordingConfig::default().with_fps(0).validate().is_err());
        assert!(RecordingConfig::default().with_async_encoding(0).validate().is_err());
        assert!(RecordingConfig::default().with_output_path("").validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: RecordingConfig = toml::from_str("format = \"gif\"\nfps = 10\n").unwrap();
        assert_eq!(config.format, ContainerFormat::Gif);
        assert_eq!(config.fps, 10);
        assert_eq!(config.max_frames, 600);
    }

    #[test]
    fn test_timestamped_output() {
        let at = Utc.with_ymd_and_hms(2026, 10, 14, 15, 30, 0).unwrap();
        let path = timestamped_output(Path::new("caps"), ContainerFormat::Gif, at);
        assert_eq!(path, PathBuf::from("caps/recording_20261014_153000.gif"));
    }

    #[test]
    fn test_avg_bitrate() {
        let mut stats = RecordingStats::empty(ContainerFormat::Avi, Path::new("a.avi"));
        assert_eq!(stats.avg_bitrate(), 0.0);
        stats.bytes_written = 1000;
        stats.duration_secs = 2.0;
        assert_eq!(stats.avg_bitrate(), 4000.0);
    }
}
