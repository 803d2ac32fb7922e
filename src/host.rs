//! Adapter between a render loop and a recording session
//!
//! A host renders one frame per [`RenderHost::on_tick`] and exposes the
//! result as a [`PixelSource`]. [`RecordingHost`] drives the session from
//! that loop: a manual toggle, and an optional auto-record mode that starts
//! on the first frame and saves once the duration has elapsed. Exiting the
//! process after an auto-recording is left to the caller, see
//! [`RecordingHost::auto_record_finished`].

use std::time::Duration;

use crate::capture::PixelSource;
use crate::errors::RecorderError;
use crate::recording::{RecordingSession, RecordingStats, TickOutcome};

/// A render loop that can be sampled after each frame
pub trait RenderHost: PixelSource {
    /// Update and draw the next frame
    fn on_tick(&mut self) -> Result<(), RecorderError>;
}

/// What one host tick did to the recording
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// Nothing is being recorded
    Idle,
    Started,
    Captured,
    Dropped,
    /// The frame failed to capture or encode and was left out
    Skipped,
    Saved(RecordingStats),
}

pub struct RecordingHost<H: RenderHost> {
    host: H,
    session: RecordingSession,
    auto_duration: Option<Duration>,
    auto_started: bool,
    auto_finished: bool,
    toggle_requested: bool,
    ticks: u64,
}

impl<H: RenderHost> RecordingHost<H> {
    pub fn new(host: H, session: RecordingSession) -> Self {
        Self {
            host,
            session,
            auto_duration: None,
            auto_started: false,
            auto_finished: false,
            toggle_requested: false,
            ticks: 0,
        }
    }

    /// Start recording on the first tick and save after `duration`
    pub fn with_auto_record(mut self, duration: Duration) -> Self {
        self.auto_duration = Some(duration);
        self
    }

    /// Flip recording on or off at the next tick
    pub fn request_toggle(&mut self) {
        self.toggle_requested = !self.toggle_requested;
    }

    /// Render one frame and feed it to the session
    pub fn tick(&mut self) -> Result<HostEvent, RecorderError> {
        self.host.on_tick()?;
        self.ticks += 1;

        let mut started = false;
        if self.auto_duration.is_some() && !self.auto_started {
            self.auto_started = true;
            started = self.begin()?;
            if started {
                log::info!("Auto-recording to {:?}", self.session.output_path());
            }
        }

        if std::mem::take(&mut self.toggle_requested) {
            if self.session.is_recording() {
                return self.save();
            }
            started = self.begin()?;
        }

        if let Some(duration) = self.auto_duration {
            let due = self.session.elapsed_secs() >= duration.as_secs_f64();
            if due && !started && !self.auto_finished && self.session.is_recording() {
                log::info!("Auto-record duration {:?} elapsed", duration);
                return self.save();
            }
        }

        let event = match self.session.capture_frame(&mut self.host) {
            Ok(TickOutcome::Idle) => HostEvent::Idle,
            Ok(TickOutcome::Captured) => HostEvent::Captured,
            Ok(TickOutcome::Dropped) => HostEvent::Dropped,
            Ok(TickOutcome::AutoStopped(stats)) => {
                self.mark_saved();
                HostEvent::Saved(stats)
            }
            Err(e) if e.is_recoverable() => HostEvent::Skipped,
            Err(e) => return Err(e),
        };

        Ok(match (started, event) {
            (true, HostEvent::Captured) => HostEvent::Started,
            (_, event) => event,
        })
    }

    /// Start a recording sized to the host's current bounds
    fn begin(&mut self) -> Result<bool, RecorderError> {
        if self.session.is_recording() {
            return Ok(false);
        }
        let (width, height) = self.host.bounds();
        self.session.start(width, height)?;
        Ok(true)
    }

    fn save(&mut self) -> Result<HostEvent, RecorderError> {
        let stats = self.session.stop()?;
        self.mark_saved();
        Ok(HostEvent::Saved(stats))
    }

    fn mark_saved(&mut self) {
        if self.auto_duration.is_some() {
            self.auto_finished = true;
        }
    }

    /// Save whatever is being recorded, for shutdown paths
    pub fn finish(&mut self) -> Result<Option<RecordingStats>, RecorderError> {
        if !self.session.is_recording() {
            return Ok(None);
        }
        self.save().map(|event| match event {
            HostEvent::Saved(stats) => Some(stats),
            _ => None,
        })
    }

    /// True once an auto-recording has been saved
    pub fn auto_record_finished(&self) -> bool {
        self.auto_finished
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn session(&self) -> &RecordingSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut RecordingSession {
        &mut self.session
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}
