//! Background encoder fed by a bounded queue
//!
//! The render thread only pays for readback and a `try_send`. One worker
//! thread owns the encoder and the container writer; when the queue is full
//! the frame is dropped rather than stalling the render loop.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use super::container::{ContainerSummary, ContainerWriter};
use super::encoder::FrameEncoder;
use crate::errors::RecorderError;
use crate::types::RawFrame;

/// What happened to a frame handed to [`EncodeWorker::submit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Queued,
    /// Queue was full, the frame was discarded
    Dropped,
    /// The worker has stopped, usually after a fatal error
    Closed,
}

/// Result of a worker that drained its queue and finalized the container
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSummary {
    pub container: ContainerSummary,
    /// Frames that failed to encode and were left out
    pub skipped_frames: u64,
}

pub struct EncodeWorker {
    sender: Option<Sender<RawFrame>>,
    handle: Option<JoinHandle<Result<WorkerSummary, RecorderError>>>,
    failed: Arc<AtomicBool>,
    encoded: Arc<AtomicU64>,
    queued: u64,
    dropped: u64,
}

impl EncodeWorker {
    pub fn spawn(
        encoder: FrameEncoder,
        writer: Box<dyn ContainerWriter>,
        capacity: usize,
    ) -> Result<Self, RecorderError> {
        if capacity == 0 {
            return Err(RecorderError::InvalidConfig(
                "encode queue capacity must be at least 1".to_string(),
            ));
        }

        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        let failed = Arc::new(AtomicBool::new(false));
        let encoded = Arc::new(AtomicU64::new(0));
        let failed_clone = failed.clone();
        let encoded_clone = encoded.clone();
        let format = writer.format();

        let handle = std::thread::Builder::new()
            .name(format!("framereel-encode-{}", format))
            .spawn(move || encode_loop(receiver, encoder, writer, failed_clone, encoded_clone))
            .map_err(|e| RecorderError::IoError(format!("Failed to spawn encode worker: {}", e)))?;

        log::debug!("Encode worker started for {} (queue {})", format, capacity);
        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
            failed,
            encoded,
            queued: 0,
            dropped: 0,
        })
    }

    /// Non-blocking hand-off of one frame
    pub fn submit(&mut self, frame: RawFrame) -> Submission {
        let Some(sender) = self.sender.as_ref() else {
            return Submission::Closed;
        };
        match sender.try_send(frame) {
            Ok(()) => {
                self.queued += 1;
                Submission::Queued
            }
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                log::debug!("Encode queue full, dropped frame ({} dropped so far)", self.dropped);
                Submission::Dropped
            }
            Err(TrySendError::Disconnected(_)) => Submission::Closed,
        }
    }

    /// True when a submit right now would be dropped
    pub fn is_saturated(&self) -> bool {
        self.sender.as_ref().map_or(true, |s| s.is_full())
    }

    /// Count a frame that was dropped before it was even read back
    pub fn record_drop(&mut self) {
        self.dropped += 1;
    }

    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    pub fn queued(&self) -> u64 {
        self.queued
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Frames the worker has appended to the container so far
    pub fn encoded(&self) -> u64 {
        self.encoded.load(Ordering::Relaxed)
    }

    pub fn pending(&self) -> usize {
        self.sender.as_ref().map_or(0, |s| s.len())
    }

    /// Close the queue, wait for the backlog to drain and finalize
    pub fn finish(mut self) -> Result<WorkerSummary, RecorderError> {
        self.join()
    }

    fn join(&mut self) -> Result<WorkerSummary, RecorderError> {
        // Closing the channel ends the worker's receive loop once it is empty.
        self.sender.take();
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| RecorderError::EncodingError("encode worker panicked".to_string()))?,
            None => Err(RecorderError::SessionClosed),
        }
    }
}

impl Drop for EncodeWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(e) = self.join() {
                log::warn!("Encode worker dropped without a clean finish: {}", e);
            }
        }
    }
}

fn encode_loop(
    receiver: Receiver<RawFrame>,
    mut encoder: FrameEncoder,
    mut writer: Box<dyn ContainerWriter>,
    failed: Arc<AtomicBool>,
    encoded: Arc<AtomicU64>,
) -> Result<WorkerSummary, RecorderError> {
    let mut skipped_frames = 0u64;

    for frame in receiver.iter() {
        let appended = encoder
            .encode(&frame)
            .and_then(|encoded_frame| writer.append_frame(encoded_frame));
        match appended {
            Ok(()) => {
                encoded.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) if e.is_recoverable() => {
                skipped_frames += 1;
                log::warn!("Skipping frame in encode worker: {}", e);
            }
            Err(e) => {
                log::error!("Encode worker stopping after fatal error: {}", e);
                failed.store(true, Ordering::Release);
                match writer.finalize() {
                    Ok(summary) => log::warn!("Kept {} frames written before the failure", summary.frames),
                    Err(fe) => log::warn!("Discarding unfinished recording: {}", fe),
                }
                return Err(e);
            }
        }
    }

    let container = writer.finalize().map_err(|e| {
        failed.store(true, Ordering::Release);
        e
    })?;
    Ok(WorkerSummary {
        container,
        skipped_frames,
    })
}
