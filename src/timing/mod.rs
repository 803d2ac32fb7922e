//! Recording clock and per-container frame intervals
//!
//! Every container stores one uniform delay per frame, expressed in its own
//! native unit. All three are derived from the integer frame rate by
//! truncating division.

use std::time::{Duration, Instant};

/// Microseconds per frame written into the AVI main header
pub fn avi_micros_per_frame(fps: u32) -> u32 {
    1_000_000 / fps.max(1)
}

/// GIF graphic-control delay in centiseconds
pub fn gif_delay_centis(fps: u32) -> u16 {
    (100 / fps.max(1)) as u16
}

/// WebP `ANMF` frame duration in milliseconds
pub fn webp_duration_millis(fps: u32) -> u32 {
    1000 / fps.max(1)
}

/// Media duration of `frames` frames at `fps`
pub fn media_duration_secs(frames: u64, fps: u32) -> f64 {
    frames as f64 / fps.max(1) as f64
}

/// Monotonic wall clock for a single recording
///
/// Started when a session transitions to recording; the host's duration
/// policy and the final stats both read from it.
#[derive(Debug, Clone, Copy)]
pub struct RecordingClock {
    start: Instant,
}

impl RecordingClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn from_instant(start: Instant) -> Self {
        Self { start }
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    #[inline]
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    pub fn start_instant(&self) -> Instant {
        self.start
    }
}

impl Default for RecordingClock {
    fn default() -> Self {
        Self::start()
    }
}
