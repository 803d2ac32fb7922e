//! Recording session: Idle/Recording state machine over encoder and writer

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::config::{RecordingConfig, RecordingStats};
use super::container::{open_writer, ContainerSummary, ContainerWriter};
use super::encoder::{check_frame, FrameEncoder};
use super::palette::Palette;
use super::worker::{EncodeWorker, Submission};
use crate::capture::{capture, PixelSource};
use crate::errors::RecorderError;
use crate::timing::RecordingClock;
use crate::types::RawFrame;

/// Result of one [`RecordingSession::capture_frame`] call
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Not recording, nothing was read
    Idle,
    /// Frame was captured and handed to the encoder
    Captured,
    /// Background encoder was saturated, the frame was not read back
    Dropped,
    /// Frame limit reached; the session saved the recording and is idle
    AutoStopped(RecordingStats),
}

impl TickOutcome {
    pub fn is_captured(&self) -> bool {
        matches!(self, TickOutcome::Captured)
    }

    pub fn stats(&self) -> Option<&RecordingStats> {
        match self {
            TickOutcome::AutoStopped(stats) => Some(stats),
            _ => None,
        }
    }
}

/// Synchronous encoder and writer owned by the render thread
struct FrameSink {
    encoder: FrameEncoder,
    writer: Box<dyn ContainerWriter>,
}

impl FrameSink {
    fn push(&mut self, frame: &RawFrame) -> Result<(), RecorderError> {
        let encoded = self.encoder.encode(frame)?;
        self.writer.append_frame(encoded)
    }
}

enum Pipeline {
    Inline(FrameSink),
    Worker(EncodeWorker),
}

struct ActiveRecording {
    pipeline: Pipeline,
    width: u32,
    height: u32,
    clock: RecordingClock,
    started_at: DateTime<Utc>,
    frame_count: u64,
    dropped_frames: u64,
    skipped_frames: u64,
}

/// One recording at a time, started and stopped by the host
pub struct RecordingSession {
    config: RecordingConfig,
    palette: Arc<Palette>,
    output_path: PathBuf,
    active: Option<ActiveRecording>,
}

impl RecordingSession {
    pub fn new(config: RecordingConfig) -> Self {
        Self::with_palette(config, Palette::shared_plan9())
    }

    pub fn with_palette(config: RecordingConfig, palette: Arc<Palette>) -> Self {
        let output_path = config.resolved_output_path();
        Self {
            config,
            palette,
            output_path,
            active: None,
        }
    }

    pub fn config(&self) -> &RecordingConfig {
        &self.config
    }

    /// Replace the configuration used by the next `start`
    pub fn set_config(&mut self, config: RecordingConfig) -> Result<(), RecorderError> {
        if self.is_recording() {
            return Err(RecorderError::InvalidConfig(
                "cannot change configuration while recording".to_string(),
            ));
        }
        self.output_path = config.resolved_output_path();
        self.config = config;
        Ok(())
    }

    /// Begin recording `width` x `height` frames.
    ///
    /// Calling this while already recording succeeds without touching the
    /// open writer or the frame count.
    pub fn start(&mut self, width: u32, height: u32) -> Result<(), RecorderError> {
        if self.active.is_some() {
            log::debug!("start() while already recording {:?}, ignoring", self.output_path);
            return Ok(());
        }
        self.config.validate()?;

        let format = self.config.format;
        let output_path = self.config.resolved_output_path();
        let writer = open_writer(
            format,
            &output_path,
            width,
            height,
            self.config.fps,
            self.palette.clone(),
        )?;
        let encoder = FrameEncoder::for_format(
            format,
            width,
            height,
            self.config.effective_quality(),
            self.palette.clone(),
        );

        let pipeline = if self.config.async_encoding {
            Pipeline::Worker(EncodeWorker::spawn(encoder, writer, self.config.queue_capacity)?)
        } else {
            Pipeline::Inline(FrameSink { encoder, writer })
        };

        log::info!(
            "Recording started: {} {}x{} @ {}fps -> {:?}",
            format,
            width,
            height,
            self.config.fps,
            output_path
        );

        self.output_path = output_path;
        self.active = Some(ActiveRecording {
            pipeline,
            width,
            height,
            clock: RecordingClock::start(),
            started_at: Utc::now(),
            frame_count: 0,
            dropped_frames: 0,
            skipped_frames: 0,
        });
        Ok(())
    }

    /// Per-tick hook: sample `surface` into the recording if one is active.
    ///
    /// Recoverable capture and encoding failures are returned while the
    /// session keeps recording. Any other error ends the recording.
    pub fn capture_frame<S: PixelSource + ?Sized>(
        &mut self,
        surface: &mut S,
    ) -> Result<TickOutcome, RecorderError> {
        let Some(active) = self.active.as_mut() else {
            return Ok(TickOutcome::Idle);
        };

        let max_frames = self.config.max_frames as u64;
        if max_frames > 0 && active.frame_count >= max_frames {
            log::info!("Reached {} frames, stopping recording", max_frames);
            return self.stop().map(TickOutcome::AutoStopped);
        }

        if let Pipeline::Worker(worker) = &mut active.pipeline {
            if worker.has_failed() {
                return Err(self.abort());
            }
            if worker.is_saturated() {
                worker.record_drop();
                active.dropped_frames += 1;
                return Ok(TickOutcome::Dropped);
            }
        }

        let (width, height) = (active.width, active.height);
        let outcome = capture(surface).and_then(|frame| match &mut active.pipeline {
            Pipeline::Inline(sink) => sink.push(&frame).map(|_| TickOutcome::Captured),
            Pipeline::Worker(worker) => {
                // Encode errors on the worker never reach the caller.
                check_frame(&frame, width, height)?;
                match worker.submit(frame) {
                    Submission::Queued => Ok(TickOutcome::Captured),
                    Submission::Dropped => Ok(TickOutcome::Dropped),
                    Submission::Closed => Err(RecorderError::SessionClosed),
                }
            }
        });

        match outcome {
            Ok(TickOutcome::Captured) => {
                active.frame_count += 1;
                Ok(TickOutcome::Captured)
            }
            Ok(TickOutcome::Dropped) => {
                active.dropped_frames += 1;
                Ok(TickOutcome::Dropped)
            }
            Ok(other) => Ok(other),
            Err(e) if e.is_recoverable() => {
                active.skipped_frames += 1;
                log::warn!("Skipped frame {}: {}", active.frame_count, e);
                Err(e)
            }
            Err(RecorderError::SessionClosed) => Err(self.abort()),
            Err(e) => {
                log::error!("Recording to {:?} failed: {}", self.output_path, e);
                self.salvage();
                Err(e)
            }
        }
    }

    /// Finalize the container and return to idle.
    ///
    /// Stopping an idle session succeeds with empty stats.
    pub fn stop(&mut self) -> Result<RecordingStats, RecorderError> {
        let Some(active) = self.active.take() else {
            return Ok(RecordingStats::empty(self.config.format, &self.output_path));
        };

        let wall_clock_secs = active.clock.elapsed_secs();
        let (summary, worker_skipped) = match active.pipeline {
            Pipeline::Inline(mut sink) => (sink.writer.finalize(), 0),
            Pipeline::Worker(worker) => match worker.finish() {
                Ok(done) => (Ok(done.container), done.skipped_frames),
                Err(e) => (Err(e), 0),
            },
        };
        let summary: ContainerSummary = summary.map_err(|e| {
            log::warn!("Failed to finalize {:?}: {}", self.output_path, e);
            e
        })?;

        let actual_fps = if wall_clock_secs > 0.0 {
            summary.frames as f64 / wall_clock_secs
        } else {
            0.0
        };
        let stats = RecordingStats {
            video_frames: summary.frames,
            dropped_frames: active.dropped_frames,
            skipped_frames: active.skipped_frames + worker_skipped,
            duration_secs: summary.duration_secs,
            wall_clock_secs,
            bytes_written: summary.bytes_written,
            actual_fps,
            output_path: self.output_path.to_string_lossy().to_string(),
            format: summary.format,
            started_at: Some(active.started_at),
        };

        log::info!(
            "Recording saved: {} frames, {} bytes -> {}",
            stats.video_frames,
            stats.bytes_written,
            stats.output_path
        );
        Ok(stats)
    }

    /// End a recording after a fatal error, keeping the frames already written.
    ///
    /// A container that can no longer be finalized is discarded by its writer.
    fn salvage(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        let finalized = match active.pipeline {
            Pipeline::Inline(mut sink) => sink.writer.finalize(),
            Pipeline::Worker(worker) => worker.finish().map(|done| done.container),
        };
        match finalized {
            Ok(summary) => log::warn!(
                "Kept {} frames in {:?} after the failure",
                summary.frames,
                self.output_path
            ),
            Err(e) => log::warn!("Discarded {:?}: {}", self.output_path, e),
        }
    }

    /// Tear down a recording whose worker died and return the worker's error
    fn abort(&mut self) -> RecorderError {
        let error = match self.active.take().map(|a| a.pipeline) {
            Some(Pipeline::Worker(worker)) => match worker.finish() {
                Err(e) => e,
                Ok(_) => RecorderError::SessionClosed,
            },
            _ => RecorderError::SessionClosed,
        };
        log::error!("Recording to {:?} failed: {}", self.output_path, error);
        error
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// Frames accepted by the current recording, 0 when idle
    pub fn frame_count(&self) -> u64 {
        self.active.as_ref().map_or(0, |a| a.frame_count)
    }

    pub fn dropped_frames(&self) -> u64 {
        self.active.as_ref().map_or(0, |a| a.dropped_frames)
    }

    pub fn skipped_frames(&self) -> u64 {
        self.active.as_ref().map_or(0, |a| a.skipped_frames)
    }

    /// Dimensions of the current recording
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.active.as_ref().map(|a| (a.width, a.height))
    }

    /// File the current (or next) recording is written to
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Seconds since `start`, 0 when idle
    pub fn elapsed_secs(&self) -> f64 {
        self.active.as_ref().map_or(0.0, |a| a.clock.elapsed_secs())
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if self.is_recording() {
            if let Err(e) = self.stop() {
                log::warn!("Recording lost on drop: {}", e);
            }
        }
    }
}
