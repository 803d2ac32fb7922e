//! framereel: record a render loop to MJPEG/AVI, animated GIF or animated WebP
//!
//! Once per rendered frame the host hands its surface to a
//! [`RecordingSession`], which reads the pixels back, encodes them and
//! appends them to the open container. Stopping the session finalizes the
//! file.
//!
//! # Features
//! - Streaming Motion-JPEG AVI with an `idx1` index
//! - Animated GIF and lossless animated WebP over a fixed 256-color palette
//! - Optional background encoding over a bounded queue
//! - Container probing for finished recordings
//!
//! # Usage
//! ```rust,no_run
//! use framereel::{RecordingConfig, RecordingSession};
//! use framereel::testing::GradientSurface;
//!
//! framereel::init_logging();
//! let config = RecordingConfig::for_output("capture.avi").with_max_frames(90);
//! let mut session = RecordingSession::new(config);
//! let mut surface = GradientSurface::new(640, 480);
//!
//! session.start(640, 480)?;
//! while session.is_recording() {
//!     session.capture_frame(&mut surface)?;
//! }
//! # Ok::<(), framereel::RecorderError>(())
//! ```
pub mod capture;
pub mod config;
pub mod errors;
pub mod host;
pub mod probe;
pub mod recording;
pub mod timing;
pub mod types;

// Testing utilities - synthetic surfaces for offline testing
pub mod testing;

// Re-exports for convenience
pub use capture::{capture, PixelSource};
pub use config::{AutoRecordConfig, FrameReelConfig};
pub use errors::RecorderError;
pub use host::{HostEvent, RecordingHost, RenderHost};
pub use probe::{inspect_bytes, inspect_file, ContainerInfo};
pub use recording::{RecordingConfig, RecordingSession, RecordingStats, TickOutcome};
pub use types::{ContainerFormat, RawFrame};

/// Initialize logging for the recorder
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "framereel=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        formats: vec![ContainerFormat::Avi, ContainerFormat::Gif, ContainerFormat::Webp],
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Containers this build can write
    pub formats: Vec<ContainerFormat>,
}
