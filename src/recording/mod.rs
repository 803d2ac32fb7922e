//! Frame recording for framereel
//!
//! This module turns sampled RGBA frames into container files:
//! - Motion-JPEG inside AVI, streamed to disk as frames arrive
//! - Palette-indexed animated GIF
//! - Lossless animated WebP
//!
//! # Example
//! ```rust,no_run
//! use framereel::recording::{RecordingConfig, RecordingSession};
//! use framereel::testing::GradientSurface;
//!
//! let mut session = RecordingSession::new(RecordingConfig::for_output("out.gif"));
//! let mut surface = GradientSurface::new(320, 240);
//! session.start(320, 240)?;
//!
//! // Once per rendered frame:
//! session.capture_frame(&mut surface)?;
//!
//! let stats = session.stop()?;
//! # Ok::<(), framereel::RecorderError>(())
//! ```

mod config;
pub mod container;
mod encoder;
pub mod palette;
mod recorder;
mod worker;

pub use config::{
    clamp_quality, timestamped_output, RecordingConfig, RecordingStats, DEFAULT_FPS,
    DEFAULT_MAX_FRAMES, DEFAULT_QUEUE_CAPACITY,
};
pub use container::{
    open_writer, AviWriter, ContainerSummary, ContainerWriter, GifWriter, IndexEntry, WebpWriter,
};
pub use encoder::{
    indexed_to_rgba, normalize_quality, quantize_pixels, EncodedFrame, FrameEncoder, FrameKind,
    JpegEncoder, PaletteQuantizer, DEFAULT_JPEG_QUALITY,
};
pub use palette::Palette;
pub use recorder::{RecordingSession, TickOutcome};
pub use worker::{EncodeWorker, Submission, WorkerSummary};

#[cfg(test)]
mod tests;
