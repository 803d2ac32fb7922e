//! Configuration management for framereel
//!
//! Settings come from an optional TOML file, then environment variables,
//! then whatever the caller sets explicitly.

use crate::errors::RecorderError;
use crate::recording::{clamp_quality, RecordingConfig};
use crate::types::ContainerFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_AUTO_RECORD_DURATION: Duration = Duration::from_secs(10);

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameReelConfig {
    pub recording: RecordingConfig,
    pub auto_record: AutoRecordConfig,
}

/// Record from the first frame and save after a fixed duration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoRecordConfig {
    pub enabled: bool,
    /// Duration such as `10s`, `1.5s`, `500ms` or `1m30s`
    pub duration: String,
}

impl Default for AutoRecordConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            duration: "10s".to_string(),
        }
    }
}

impl AutoRecordConfig {
    /// Parsed duration, 10 seconds when the string is not a valid duration
    pub fn duration(&self) -> Duration {
        parse_duration(&self.duration).unwrap_or_else(|| {
            log::warn!(
                "Invalid auto-record duration {:?}, using {:?}",
                self.duration,
                DEFAULT_AUTO_RECORD_DURATION
            );
            DEFAULT_AUTO_RECORD_DURATION
        })
    }
}

impl FrameReelConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, RecorderError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            RecorderError::InvalidConfig(format!("Failed to read config file: {}", e))
        })?;

        let config: FrameReelConfig = toml::from_str(&contents).map_err(|e| {
            RecorderError::InvalidConfig(format!("Failed to parse config file: {}", e))
        })?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), RecorderError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    RecorderError::IoError(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let toml_string = toml::to_string_pretty(self).map_err(|e| {
            RecorderError::InvalidConfig(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, toml_string).map_err(|e| {
            RecorderError::IoError(format!("Failed to write config file: {}", e))
        })?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("framereel.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Override settings from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Override settings from `lookup`, which returns the variable's value
    ///
    /// Honours `RECORD_OUTPUT`, `RECORD_FORMAT`, `RECORD_FPS`,
    /// `RECORD_QUALITY`, `RECORD_MAX_FRAMES`, `AUTO_RECORD` and
    /// `RECORD_DURATION`. Unparsable numbers are ignored with a warning.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let rec = &mut self.recording;

        if let Some(output) = get("RECORD_OUTPUT") {
            if let Some(format) = ContainerFormat::from_path(&output) {
                rec.format = format;
            }
            rec.output_path = Some(PathBuf::from(output));
        }
        if let Some(name) = get("RECORD_FORMAT") {
            match ContainerFormat::parse(&name) {
                Some(format) => rec.format = format,
                None => log::warn!("Ignoring unknown RECORD_FORMAT {:?}", name),
            }
        }
        if let Some(fps) = parse_env(&get, "RECORD_FPS") {
            rec.fps = fps;
        }
        if let Some(quality) = parse_env::<i64, _>(&get, "RECORD_QUALITY") {
            rec.quality = clamp_quality(quality);
        }
        if let Some(max_frames) = parse_env(&get, "RECORD_MAX_FRAMES") {
            rec.max_frames = max_frames;
        }

        if get("AUTO_RECORD").is_some() {
            self.auto_record.enabled = true;
        }
        if let Some(duration) = get("RECORD_DURATION") {
            if parse_duration(&duration).is_none() {
                log::warn!(
                    "Invalid RECORD_DURATION {:?}, using {:?}",
                    duration,
                    DEFAULT_AUTO_RECORD_DURATION
                );
                self.auto_record.duration = "10s".to_string();
            } else {
                self.auto_record.duration = duration;
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), RecorderError> {
        self.recording.validate()?;
        if parse_duration(&self.auto_record.duration).is_none() {
            return Err(RecorderError::InvalidConfig(format!(
                "auto_record.duration {:?} is not a duration",
                self.auto_record.duration
            )));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr, G: Fn(&str) -> Option<String>>(get: &G, key: &str) -> Option<T> {
    let raw = get(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring unparsable {}={:?}", key, raw);
            None
        }
    }
}

/// Parse a duration written as a sequence of `<number><unit>` terms
///
/// Units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`; numbers may carry
/// a fraction. A bare `0` is accepted. Negative durations are rejected.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let s = input.trim();
    if s == "0" {
        return Some(Duration::ZERO);
    }
    if s.is_empty() {
        return None;
    }

    let mut rest = s;
    let mut total_nanos = 0f64;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number = &rest[..num_len];
        if number.is_empty() || number == "." {
            return None;
        }
        let value: f64 = number.parse().ok()?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total_nanos += value * scale;
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return None;
    }
    Some(Duration::from_nanos(total_nanos.round() as u64))
}
