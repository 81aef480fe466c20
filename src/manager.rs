//! Replay manager
//!
//! Owns one recorder, one player and the saved-replay library. Hosts build a
//! single manager at startup and drive it from their tick loop. Recording and
//! playback are mutually exclusive: starting one ends the other.

use crate::error::ReplayError;
use crate::persistence::{KeyValueStore, ReplayLibrary};
use crate::replay::{
    FinalStats, Player, Recorder, RecordingOptions, RenderState, Replay, ReplayEvent,
    SimSnapshot,
};
use crate::settings::{ReplaySettings, SampleRate};

pub struct ReplayManager<S: KeyValueStore> {
    settings: ReplaySettings,
    recorder: Recorder,
    player: Player,
    library: ReplayLibrary<S>,
    /// Most recent finished recording (saved or not)
    last_replay: Option<Replay>,
}

impl<S: KeyValueStore> ReplayManager<S> {
    /// Build from a store, loading persisted settings and saved replays
    pub fn new(store: S) -> Self {
        let settings = ReplaySettings::load(&store);
        let library = ReplayLibrary::open(store, settings.max_saved_replays);
        Self::from_parts(settings, library)
    }

    /// Build with explicit settings and id seed (tests, tools)
    pub fn with_settings(store: S, settings: ReplaySettings, seed: u64) -> Self {
        let settings = settings.sanitized();
        let library = ReplayLibrary::with_seed(store, settings.max_saved_replays, seed);
        Self::from_parts(settings, library)
    }

    fn from_parts(settings: ReplaySettings, library: ReplayLibrary<S>) -> Self {
        Self {
            recorder: Recorder::new(settings.sample_interval_ms, settings.max_frames),
            player: Player::new(),
            library,
            settings,
            last_replay: None,
        }
    }

    // === Recording ===

    /// Start recording, ending any playback in progress
    pub fn start_recording(&mut self, options: RecordingOptions, now: f64) {
        self.player.stop_playback();
        self.recorder.cancel_recording();
        self.recorder
            .reconfigure(self.settings.sample_interval_ms, self.settings.max_frames);
        self.recorder.start_recording(options, now);
    }

    pub fn record_frame(&mut self, state: &SimSnapshot, now: f64) -> bool {
        self.recorder.record_frame(state, now)
    }

    /// Stop recording; auto-saves when enabled. Returns the finished replay.
    pub fn stop_recording(&mut self, stats: FinalStats, now: f64) -> Option<&Replay> {
        let replay = self.recorder.stop_recording(stats)?;
        if self.settings.auto_save {
            self.library.save(&replay, None, now);
        }
        self.last_replay = Some(replay);
        self.last_replay.as_ref()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn last_replay(&self) -> Option<&Replay> {
        self.last_replay.as_ref()
    }

    /// Save the most recent recording
    pub fn save_last(&mut self, name: Option<&str>, now: f64) -> Option<String> {
        let replay = self.last_replay.as_ref()?;
        self.library.save(replay, name, now)
    }

    // === Playback ===

    /// Play an in-memory replay
    pub fn play(&mut self, replay: Replay, speed: Option<f32>) -> Result<(), ReplayError> {
        if self.recorder.is_recording() {
            log::info!("Stopping recording to start playback");
        }
        self.recorder.cancel_recording();
        self.player.load(replay);
        self.player
            .start_playback(speed.unwrap_or(self.settings.default_playback_speed))
    }

    /// Replay the most recent recording
    pub fn play_last(&mut self, speed: Option<f32>) -> Result<(), ReplayError> {
        let replay = self.last_replay.clone().ok_or(ReplayError::NoReplayLoaded)?;
        self.play(replay, speed)
    }

    /// Decode and play a saved replay
    pub fn play_saved(&mut self, id: &str, speed: Option<f32>) -> Result<(), ReplayError> {
        let replay = self.library.load(id)?;
        self.play(replay, speed)
    }

    /// Best completed run on a level, decoded for use as a ghost
    pub fn ghost_for_level(&self, level: u32) -> Option<Replay> {
        let saved = self.library.best_for_level(level)?;
        match saved.decode() {
            Ok(replay) => Some(replay),
            Err(e) => {
                log::warn!("Ghost replay {} unreadable: {}", saved.id, e);
                None
            }
        }
    }

    /// Advance playback by one render tick
    pub fn update(&mut self, delta: f64) -> Option<RenderState> {
        self.player.update(delta)
    }

    // === Components ===

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut Player {
        &mut self.player
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn library(&self) -> &ReplayLibrary<S> {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut ReplayLibrary<S> {
        &mut self.library
    }

    pub fn settings(&self) -> &ReplaySettings {
        &self.settings
    }

    /// Replace and persist settings. Capture settings apply from the next
    /// recording.
    pub fn update_settings(&mut self, settings: ReplaySettings) {
        self.settings = settings.sanitized();
        self.settings.save(self.library.store_mut());
        self.library.set_max_saved(self.settings.max_saved_replays);
        self.recorder
            .reconfigure(self.settings.sample_interval_ms, self.settings.max_frames);
    }

    /// Switch capture rate preset, keeping the same maximum recording length
    pub fn set_sample_rate(&mut self, rate: SampleRate) {
        let mut settings = self.settings.clone();
        settings.apply_rate(rate);
        log::info!(
            "Sample rate {} ({} ms, {} frames max)",
            rate.as_str(),
            settings.sample_interval_ms,
            settings.max_frames
        );
        self.update_settings(settings);
    }

    /// Take queued notifications from every component
    pub fn drain_events(&mut self) -> Vec<ReplayEvent> {
        let mut events = self.recorder.drain_events();
        events.extend(self.player.drain_events());
        events
    }
}
