//! Frame sampler
//!
//! Turns live simulation state into a bounded-rate stream of rounded frames.
//! Capture is throttled on wall-clock time, independent of the simulation's
//! own tick rate.

use super::events::ReplayEvent;
use super::frame::{FinalStats, Frame, RecordingOptions, Replay, ReplayMetadata, SimSnapshot};
use crate::consts::*;

/// Recorder lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    /// Not recording
    Idle,
    /// Accepting frames
    Recording,
    /// Buffer full; frames held until stop, new ones rejected
    Saturated,
}

/// Captures frames while a recording session is active
#[derive(Debug)]
pub struct Recorder {
    state: RecorderState,
    metadata: Option<ReplayMetadata>,
    frames: Vec<Frame>,
    start_time: f64,
    last_sample_time: Option<f64>,
    sample_interval_ms: f64,
    max_frames: usize,
    events: Vec<ReplayEvent>,
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_INTERVAL_MS, DEFAULT_MAX_FRAMES)
    }
}

impl Recorder {
    pub fn new(sample_interval_ms: f64, max_frames: usize) -> Self {
        Self {
            state: RecorderState::Idle,
            metadata: None,
            frames: Vec::new(),
            start_time: 0.0,
            last_sample_time: None,
            sample_interval_ms: sample_interval_ms.max(0.0),
            max_frames: max_frames.max(1),
            events: Vec::new(),
        }
    }

    /// Begin a new recording, discarding anything unsaved
    pub fn start_recording(&mut self, options: RecordingOptions, now: f64) {
        if self.state != RecorderState::Idle {
            log::info!(
                "Discarding unsaved recording ({} frames)",
                self.frames.len()
            );
        }

        let metadata = options.into_metadata(now);
        log::info!(
            "Recording started: {} (level {}, vehicle {})",
            metadata.id,
            metadata.level,
            metadata.vehicle
        );
        self.events.push(ReplayEvent::RecordingStarted {
            id: metadata.id.clone(),
        });

        self.metadata = Some(metadata);
        self.frames.clear();
        self.start_time = now;
        self.last_sample_time = None;
        self.state = RecorderState::Recording;
    }

    /// Sample the simulation if recording and the throttle allows it.
    /// Returns true when a frame was appended.
    pub fn record_frame(&mut self, state: &SimSnapshot, now: f64) -> bool {
        if self.state != RecorderState::Recording {
            return false;
        }
        if let Some(last) = self.last_sample_time {
            if now - last < self.sample_interval_ms {
                return false;
            }
        }

        let t = (now - self.start_time).max(0.0).round() as u32;
        self.frames.push(Frame::capture(state, t));
        self.last_sample_time = Some(now);

        if self.frames.len() >= self.max_frames {
            log::warn!(
                "Replay buffer full ({} frames), recording stopped",
                self.frames.len()
            );
            self.state = RecorderState::Saturated;
            self.events.push(ReplayEvent::CapacityReached {
                frames: self.frames.len(),
            });
        }

        true
    }

    /// Finish the recording. Returns None if nothing was captured.
    pub fn stop_recording(&mut self, stats: FinalStats) -> Option<Replay> {
        if self.state == RecorderState::Idle {
            return None;
        }
        self.state = RecorderState::Idle;
        self.last_sample_time = None;

        let mut metadata = self.metadata.take()?;
        let frames = std::mem::take(&mut self.frames);
        if frames.is_empty() {
            log::info!("Recording {} stopped with no frames", metadata.id);
            return None;
        }

        metadata.duration = frames.last().map(|f| f.t).unwrap_or(0);
        metadata.frame_count = frames.len();
        metadata.stats = stats;

        log::info!(
            "Recording stopped: {} ({} frames, {} ms)",
            metadata.id,
            metadata.frame_count,
            metadata.duration
        );
        self.events.push(ReplayEvent::RecordingStopped {
            id: metadata.id.clone(),
            frames: metadata.frame_count,
            duration: metadata.duration,
        });

        Some(Replay { metadata, frames })
    }

    /// Drop the current recording without producing a replay
    pub fn cancel_recording(&mut self) {
        if self.state != RecorderState::Idle {
            log::info!("Recording cancelled ({} frames)", self.frames.len());
        }
        self.state = RecorderState::Idle;
        self.metadata = None;
        self.frames.clear();
        self.last_sample_time = None;
    }

    /// Change capture rate and capacity. Only allowed between recordings;
    /// queued events are kept.
    pub fn reconfigure(&mut self, sample_interval_ms: f64, max_frames: usize) -> bool {
        if self.state != RecorderState::Idle {
            return false;
        }
        self.sample_interval_ms = sample_interval_ms.max(0.0);
        self.max_frames = max_frames.max(1);
        true
    }

    /// True while frames are being accepted
    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Timestamp of the newest captured frame (ms)
    pub fn elapsed_ms(&self) -> u32 {
        self.frames.last().map(|f| f.t).unwrap_or(0)
    }

    pub fn sample_interval_ms(&self) -> f64 {
        self.sample_interval_ms
    }

    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    /// Take queued notifications
    pub fn drain_events(&mut self) -> Vec<ReplayEvent> {
        std::mem::take(&mut self.events)
    }
}
