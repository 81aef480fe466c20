//! Notifications raised by the recorder and player
//!
//! Components queue events; the host drains them once per tick.

/// Replay lifecycle notification
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayEvent {
    RecordingStarted { id: String },
    /// Frame buffer hit `max_frames`; recording no longer accepts frames
    CapacityReached { frames: usize },
    RecordingStopped { id: String, frames: usize, duration: u32 },
    PlaybackStarted { id: String, speed: f32 },
    PlaybackPaused,
    PlaybackResumed,
    PlaybackStopped,
    /// Playback clock reached the last frame (once per run)
    PlaybackComplete { id: String },
    SpeedChanged { speed: f32 },
    Seeked { time_ms: u32, cursor: usize },
}
