//! Neon Drift replay subsystem
//!
//! Core modules:
//! - `replay`: Frame sampling, delta compression and interpolated playback
//! - `persistence`: Key/value storage and the saved-replay library
//! - `platform`: Browser/native platform abstraction
//! - `settings`: Replay tunables, persisted alongside saves
//! - `manager`: Application root wiring the pieces together

pub mod error;
pub mod manager;
pub mod persistence;
pub mod platform;
pub mod replay;
pub mod settings;

pub use error::{ReplayError, StorageError};
pub use manager::ReplayManager;
pub use persistence::{KeyValueStore, MemoryStore, ReplayLibrary, SavedReplay};
pub use replay::{
    CompactReplay, Frame, FrameDelta, PlaybackState, Player, Recorder, RenderState, Replay,
    ReplayEvent, ReplayMetadata, SimSnapshot,
};
pub use settings::{ReplaySettings, SampleRate};

/// Replay configuration constants
pub mod consts {
    /// Current replay schema version
    pub const REPLAY_VERSION: u32 = 2;

    /// Minimum spacing between captured frames (~60 Hz ceiling)
    pub const DEFAULT_SAMPLE_INTERVAL_MS: f64 = 16.0;
    /// Frame buffer ceiling (5 minutes at 60 Hz)
    pub const DEFAULT_MAX_FRAMES: usize = 18_000;
    /// Saved replays kept in storage before the oldest is evicted
    pub const DEFAULT_MAX_SAVED_REPLAYS: usize = 10;

    /// Playback speed bounds
    pub const MIN_PLAYBACK_SPEED: f32 = 0.25;
    pub const MAX_PLAYBACK_SPEED: f32 = 4.0;

    /// Level and vehicle used when a recording doesn't name one
    pub const DEFAULT_LEVEL: u32 = 1;
    pub const DEFAULT_VEHICLE: &str = "default";
}

/// Round to a fixed number of decimal places
#[inline]
pub fn round_to(value: f32, decimals: i32) -> f32 {
    let factor = 10f32.powi(decimals);
    (value * factor).round() / factor
}

/// Linear interpolation between two scalars
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
