//! Replay data model
//!
//! Frames are captured from a live [`SimSnapshot`] and rounded at capture time,
//! so every later comparison (delta encoding, round trips) is exact.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::round_to;

/// Player input axes and buttons
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InputFrame {
    /// Steering axis (-1.0 - 1.0)
    pub horizontal: f32,
    /// Throttle axis (-1.0 - 1.0)
    pub vertical: f32,
    pub boost: bool,
    pub brake: bool,
}

/// Chase camera state
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraFrame {
    /// Zoom depth
    pub z: f32,
    pub rotation: f32,
}

/// Discrete scoring state (never interpolated)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreFrame {
    pub score: u64,
    pub multiplier: f32,
    pub combo: u32,
}

impl Default for ScoreFrame {
    fn default() -> Self {
        Self {
            score: 0,
            multiplier: 1.0,
            combo: 0,
        }
    }
}

/// Live simulation state handed to the recorder each tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimSnapshot {
    pub pos: Vec2,
    /// Heading in radians
    pub rotation: f32,
    pub speed: f32,
    pub boosting: bool,
    pub invincible: bool,
    pub ghost: bool,
    pub nitro: f32,
    pub camera: CameraFrame,
    pub score: ScoreFrame,
    pub input: InputFrame,
    /// Event tags raised since the previous tick (e.g. "near_miss", "lap")
    pub events: Vec<String>,
}

/// One captured (or reconstructed) snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Milliseconds since recording start
    pub t: u32,
    pub pos: Vec2,
    pub rotation: f32,
    pub speed: i32,
    pub boosting: bool,
    pub invincible: bool,
    pub ghost: bool,
    pub nitro: i32,
    pub camera: CameraFrame,
    pub score: ScoreFrame,
    pub input: InputFrame,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<String>,
}

impl Frame {
    /// Capture a frame from live state, applying the fixed-point rounding
    pub fn capture(state: &SimSnapshot, t: u32) -> Self {
        Self {
            t,
            pos: Vec2::new(round_to(state.pos.x, 1), round_to(state.pos.y, 1)),
            rotation: round_to(state.rotation, 1),
            speed: state.speed.round() as i32,
            boosting: state.boosting,
            invincible: state.invincible,
            ghost: state.ghost,
            nitro: state.nitro.round() as i32,
            camera: CameraFrame {
                z: round_to(state.camera.z, 2),
                rotation: round_to(state.camera.rotation, 1),
            },
            score: ScoreFrame {
                score: state.score.score,
                multiplier: round_to(state.score.multiplier, 1),
                combo: state.score.combo,
            },
            input: InputFrame {
                horizontal: round_to(state.input.horizontal, 2),
                vertical: round_to(state.input.vertical, 2),
                boost: state.input.boost,
                brake: state.input.brake,
            },
            events: state.events.clone(),
        }
    }
}

/// End-of-run statistics merged into metadata on stop
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalStats {
    pub score: u64,
    pub distance: f32,
    pub completed: bool,
    /// Star rating (0-3)
    pub stars: u8,
}

/// Replay header, frozen once recording stops
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayMetadata {
    pub id: String,
    /// Unix timestamp (ms) when recording started
    pub created_at: f64,
    pub level: u32,
    pub vehicle: String,
    pub version: u32,
    /// Last frame's timestamp (ms)
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub frame_count: usize,
    #[serde(default)]
    pub stats: FinalStats,
}

/// Caller-supplied metadata for a new recording; gaps fall back to defaults
#[derive(Debug, Clone, Default)]
pub struct RecordingOptions {
    pub id: Option<String>,
    pub level: Option<u32>,
    pub vehicle: Option<String>,
    pub version: Option<u32>,
}

impl RecordingOptions {
    /// Options for a level/vehicle pair
    pub fn new(level: u32, vehicle: impl Into<String>) -> Self {
        Self {
            level: Some(level),
            vehicle: Some(vehicle.into()),
            ..Default::default()
        }
    }

    /// Resolve into fresh metadata for a recording starting at `created_at`
    pub fn into_metadata(self, created_at: f64) -> ReplayMetadata {
        ReplayMetadata {
            id: self
                .id
                .unwrap_or_else(|| format!("replay_{}", created_at.max(0.0) as u64)),
            created_at,
            level: self.level.unwrap_or(DEFAULT_LEVEL),
            vehicle: self.vehicle.unwrap_or_else(|| DEFAULT_VEHICLE.to_string()),
            version: self.version.unwrap_or(REPLAY_VERSION),
            duration: 0,
            frame_count: 0,
            stats: FinalStats::default(),
        }
    }
}

/// A finalized recording: metadata plus every captured frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replay {
    pub metadata: ReplayMetadata,
    pub frames: Vec<Frame>,
}

impl Replay {
    /// Playback length in ms
    pub fn duration(&self) -> u32 {
        self.frames.last().map(|f| f.t).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Check frames are sorted by non-decreasing timestamp
    pub fn is_time_ordered(&self) -> bool {
        self.frames.windows(2).all(|w| w[0].t <= w[1].t)
    }
}
