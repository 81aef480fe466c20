//! Replay settings and preferences
//!
//! Persisted separately from saved replays.

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::persistence::KeyValueStore;

/// Capture rate presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SampleRate {
    /// ~20 Hz, smallest saves
    Low,
    /// ~30 Hz
    Medium,
    /// ~60 Hz
    #[default]
    High,
}

impl SampleRate {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleRate::Low => "Low",
            SampleRate::Medium => "Medium",
            SampleRate::High => "High",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(SampleRate::Low),
            "medium" | "med" => Some(SampleRate::Medium),
            "high" => Some(SampleRate::High),
            _ => None,
        }
    }

    /// Minimum spacing between captured frames
    pub fn interval_ms(&self) -> f64 {
        match self {
            SampleRate::Low => 50.0,
            SampleRate::Medium => 33.0,
            SampleRate::High => DEFAULT_SAMPLE_INTERVAL_MS,
        }
    }
}

/// Replay tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaySettings {
    /// Minimum ms between captured frames
    pub sample_interval_ms: f64,
    /// Frames per recording before it auto-stops
    pub max_frames: usize,
    /// Saved replays kept before the oldest is evicted
    pub max_saved_replays: usize,
    /// Speed used when playback starts without an explicit one
    pub default_playback_speed: f32,
    /// Save every finished run automatically
    pub auto_save: bool,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            max_frames: DEFAULT_MAX_FRAMES,
            max_saved_replays: DEFAULT_MAX_SAVED_REPLAYS,
            default_playback_speed: 1.0,
            auto_save: false,
        }
    }
}

impl ReplaySettings {
    /// Storage key
    pub const STORAGE_KEY: &'static str = "neon_drift_replay_settings";

    /// Settings using a capture rate preset
    pub fn from_rate(rate: SampleRate) -> Self {
        let mut settings = Self::default();
        settings.apply_rate(rate);
        settings
    }

    /// Apply a capture rate preset; keeps the recording length in seconds
    pub fn apply_rate(&mut self, rate: SampleRate) {
        let seconds = self.max_frames as f64 * self.sample_interval_ms / 1000.0;
        self.sample_interval_ms = rate.interval_ms();
        self.max_frames = ((seconds * 1000.0) / self.sample_interval_ms).round() as usize;
    }

    /// Longest recording these settings allow (seconds)
    pub fn max_recording_secs(&self) -> f64 {
        self.max_frames as f64 * self.sample_interval_ms / 1000.0
    }

    /// Replace out-of-range values with defaults
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !self.sample_interval_ms.is_finite() || self.sample_interval_ms < 0.0 {
            self.sample_interval_ms = defaults.sample_interval_ms;
        }
        if self.max_frames == 0 {
            self.max_frames = defaults.max_frames;
        }
        if self.max_saved_replays == 0 {
            self.max_saved_replays = defaults.max_saved_replays;
        }
        if self.default_playback_speed.is_nan() {
            self.default_playback_speed = defaults.default_playback_speed;
        }
        self.default_playback_speed = self
            .default_playback_speed
            .clamp(MIN_PLAYBACK_SPEED, MAX_PLAYBACK_SPEED);
        self
    }

    /// Load settings from the store, falling back to defaults
    pub fn load(store: &impl KeyValueStore) -> Self {
        if let Some(json) = store.get(Self::STORAGE_KEY) {
            if let Ok(settings) = serde_json::from_str::<ReplaySettings>(&json) {
                log::info!("Loaded replay settings");
                return settings.sanitized();
            }
        }

        log::info!("Using default replay settings");
        Self::default()
    }

    /// Save settings to the store
    pub fn save(&self, store: &mut impl KeyValueStore) {
        match serde_json::to_string(self) {
            Ok(json) => match store.set(Self::STORAGE_KEY, &json) {
                Ok(()) => log::info!("Replay settings saved"),
                Err(e) => log::warn!("Failed to save replay settings: {}", e),
            },
            Err(e) => log::warn!("Failed to encode replay settings: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;

    #[test]
    fn test_defaults() {
        let settings = ReplaySettings::default();
        assert_eq!(settings.sample_interval_ms, 16.0);
        assert_eq!(settings.max_frames, 18_000);
        assert_eq!(settings.max_recording_secs(), 288.0);
    }

    #[test]
    fn test_rate_preserves_length() {
        let settings = ReplaySettings::from_rate(SampleRate::Low);
        assert_eq!(settings.sample_interval_ms, 50.0);
        assert_eq!(settings.max_frames, 5760);
        assert_eq!(SampleRate::parse("MED"), Some(SampleRate::Medium));
        assert_eq!(SampleRate::parse("ultra"), None);
    }

    #[test]
    fn test_save_load_round_trip() {
        let mut store = MemoryStore::new();
        let settings = ReplaySettings {
            max_saved_replays: 4,
            default_playback_speed: 2.0,
            auto_save: true,
            ..Default::default()
        };
        settings.save(&mut store);
        assert_eq!(ReplaySettings::load(&store), settings);
    }

    #[test]
    fn test_load_sanitizes_and_fills_missing() {
        let mut store = MemoryStore::new();
        store
            .set(
                ReplaySettings::STORAGE_KEY,
                r#"{"max_frames":0,"default_playback_speed":9.0}"#,
            )
            .unwrap();
        let settings = ReplaySettings::load(&store);
        assert_eq!(settings.max_frames, DEFAULT_MAX_FRAMES);
        assert_eq!(settings.default_playback_speed, MAX_PLAYBACK_SPEED);
        assert_eq!(settings.max_saved_replays, DEFAULT_MAX_SAVED_REPLAYS);
    }

    #[test]
    fn test_corrupt_settings_fall_back() {
        let mut store = MemoryStore::new();
        store.set(ReplaySettings::STORAGE_KEY, "nope").unwrap();
        assert_eq!(ReplaySettings::load(&store), ReplaySettings::default());
    }
}
