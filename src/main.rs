//! Neon Drift replay entry point
//!
//! Web: exposes a `ReplayHost` class the game's JS tick loop drives.
//! Native: records a simulated lap and plays it back through the same
//! pipeline, logging each stage.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_host {
    use wasm_bindgen::prelude::*;

    use neon_drift::persistence::LocalStorageStore;
    use neon_drift::platform::{init_logging, now_ms};
    use neon_drift::replay::{FinalStats, RecordingOptions, SimSnapshot};
    use neon_drift::{ReplayManager, SampleRate};

    /// Replay subsystem handle owned by the game
    #[wasm_bindgen]
    pub struct ReplayHost {
        manager: ReplayManager<LocalStorageStore>,
    }

    #[wasm_bindgen]
    impl ReplayHost {
        #[wasm_bindgen(constructor)]
        pub fn new() -> Result<ReplayHost, JsValue> {
            let store = LocalStorageStore::open().map_err(|e| JsValue::from_str(&e.to_string()))?;
            let manager = ReplayManager::new(store);
            log::info!(
                "Replay host ready ({} saved replays)",
                manager.library().len()
            );
            Ok(ReplayHost { manager })
        }

        pub fn start_recording(&mut self, level: u32, vehicle: String) {
            self.manager
                .start_recording(RecordingOptions::new(level, vehicle), now_ms());
        }

        /// `snapshot` is a JSON `SimSnapshot`; missing fields default
        pub fn record_frame(&mut self, snapshot: &str) -> bool {
            match serde_json::from_str::<SimSnapshot>(snapshot) {
                Ok(state) => self.manager.record_frame(&state, now_ms()),
                Err(e) => {
                    log::warn!("Bad snapshot: {}", e);
                    false
                }
            }
        }

        /// Returns false if nothing was recorded
        pub fn stop_recording(&mut self, score: u64, distance: f32, completed: bool, stars: u8) -> bool {
            let stats = FinalStats {
                score,
                distance,
                completed,
                stars,
            };
            self.manager.stop_recording(stats, now_ms()).is_some()
        }

        pub fn save_last(&mut self, name: Option<String>) -> Option<String> {
            self.manager.save_last(name.as_deref(), now_ms())
        }

        pub fn play_saved(&mut self, id: &str, speed: Option<f32>) -> bool {
            match self.manager.play_saved(id, speed) {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("Cannot play {}: {}", id, e);
                    false
                }
            }
        }

        pub fn play_last(&mut self, speed: Option<f32>) -> bool {
            self.manager.play_last(speed).is_ok()
        }

        /// Interpolated render state as JSON, or undefined when not playing
        pub fn update(&mut self, delta: f64) -> Option<String> {
            let render = self.manager.update(delta)?;
            serde_json::to_string(&render).ok()
        }

        pub fn pause(&mut self) -> bool {
            self.manager.player_mut().pause_playback()
        }

        pub fn resume(&mut self) -> bool {
            self.manager.player_mut().resume_playback()
        }

        pub fn stop(&mut self) -> bool {
            self.manager.player_mut().stop_playback()
        }

        pub fn set_speed(&mut self, speed: f32) -> f32 {
            self.manager.player_mut().set_playback_speed(speed)
        }

        pub fn seek_percent(&mut self, ratio: f64) -> bool {
            self.manager.player_mut().seek_to_percent(ratio)
        }

        /// Capture rate preset ("low", "medium", "high"); false if unknown
        pub fn set_sample_rate(&mut self, rate: &str) -> bool {
            match SampleRate::parse(rate) {
                Some(rate) => {
                    self.manager.set_sample_rate(rate);
                    true
                }
                None => {
                    log::warn!("Unknown sample rate: {}", rate);
                    false
                }
            }
        }

        pub fn progress(&self) -> f64 {
            self.manager.player().progress()
        }

        /// Saved replays as a JSON array of `{id, name, savedAt, metadata}`
        pub fn list(&self) -> String {
            let entries: Vec<serde_json::Value> = self
                .manager
                .library()
                .list()
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "id": r.id,
                        "name": r.name,
                        "savedAt": r.saved_at,
                        "metadata": r.metadata,
                    })
                })
                .collect();
            serde_json::Value::Array(entries).to_string()
        }

        pub fn delete(&mut self, id: &str) -> bool {
            self.manager.library_mut().delete(id)
        }

        pub fn export(&self, id: &str) -> Option<String> {
            self.manager.library().export(id)
        }

        pub fn import(&mut self, data: &str) -> Option<String> {
            match self.manager.library_mut().import(data, now_ms()) {
                Ok(id) => Some(id),
                Err(e) => {
                    log::warn!("Import failed: {}", e);
                    None
                }
            }
        }
    }

    pub fn run() {
        init_logging();
        log::info!("Neon Drift replay module loaded");
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    wasm_host::run();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use neon_drift::persistence::MemoryStore;
    use neon_drift::replay::{FinalStats, RecordingOptions, encode, format_time};
    use neon_drift::{ReplayManager, ReplaySettings};

    neon_drift::platform::init_logging();
    log::info!("Neon Drift replay demo (native)");

    let mut manager = ReplayManager::with_settings(MemoryStore::new(), ReplaySettings::default(), 7);

    // Record a simulated 5 second lap, sim ticking at 120 Hz
    let sim_dt = 1000.0 / 120.0;
    let mut now = 0.0;
    manager.start_recording(RecordingOptions::new(3, "viper"), now);
    let mut state = demo::LapSim::new();
    for _ in 0..600 {
        state.step(sim_dt as f32 / 1000.0);
        if manager.record_frame(&state.snapshot(), now) {
            state.clear_events();
        }
        now += sim_dt;
    }

    let stats = FinalStats {
        score: state.score,
        distance: state.distance,
        completed: true,
        stars: 3,
    };
    let Some(replay) = manager.stop_recording(stats, now).cloned() else {
        log::error!("Nothing recorded");
        return;
    };

    let full_json = serde_json::to_string(&replay).map(|s| s.len()).unwrap_or(0);
    let compact = encode(&replay);
    let compact_json = serde_json::to_string(&compact)
        .map(|s| s.len())
        .unwrap_or(0);
    log::info!(
        "Recorded {} frames over {}: {} bytes full, {} bytes compact ({} idle deltas)",
        replay.frames.len(),
        format_time(replay.duration() as f64),
        full_json,
        compact_json,
        compact.idle_delta_count()
    );

    let Some(id) = manager.save_last(Some("Demo lap"), now) else {
        log::error!("Save failed");
        return;
    };
    let Some(exported) = manager.library().export(&id) else {
        log::error!("Export failed");
        return;
    };
    let imported = match manager.library_mut().import(&exported, now) {
        Ok(imported) => imported,
        Err(e) => {
            log::error!("Import failed: {}", e);
            return;
        }
    };
    log::info!(
        "Saved {} and re-imported as {} ({} in library)",
        id,
        imported,
        manager.library().len()
    );

    if let Err(e) = manager.play_saved(&imported, Some(2.0)) {
        log::error!("Playback failed: {}", e);
        return;
    }

    let mut ticks = 0u32;
    while manager.player().is_playing() {
        if let Some(render) = manager.update(16.0) {
            if ticks % 30 == 0 {
                log::info!(
                    "{} pos=({:.1}, {:.1}) speed={:.0} boost={} score={}",
                    format_time(render.time),
                    render.pos.x,
                    render.pos.y,
                    render.speed,
                    render.boosting,
                    render.score.score
                );
            }
        }
        ticks += 1;
    }

    for event in manager.drain_events() {
        log::debug!("event: {:?}", event);
    }
    println!(
        "Played {} frames in {} ticks at {}x",
        replay.frames.len(),
        ticks,
        manager.player().speed()
    );
}

#[cfg(not(target_arch = "wasm32"))]
mod demo {
    use glam::Vec2;
    use neon_drift::replay::{CameraFrame, InputFrame, ScoreFrame, SimSnapshot};

    /// Tiny kinematic car driving an oval, boosting on the straights
    pub struct LapSim {
        pub pos: Vec2,
        pub heading: f32,
        pub speed: f32,
        pub nitro: f32,
        pub score: u64,
        pub distance: f32,
        time: f32,
        events: Vec<String>,
    }

    impl LapSim {
        pub fn new() -> Self {
            Self {
                pos: Vec2::ZERO,
                heading: 0.0,
                speed: 0.0,
                nitro: 100.0,
                score: 0,
                distance: 0.0,
                time: 0.0,
                events: Vec::new(),
            }
        }

        fn steering(&self) -> f32 {
            // Straights for the first half of each 2.5s period, turns after
            if (self.time % 2.5) < 1.25 { 0.0 } else { 0.8 }
        }

        pub fn step(&mut self, dt: f32) {
            let was_boosting = self.boosting();
            self.time += dt;
            let boosting = self.boosting();
            if boosting && !was_boosting {
                self.events.push("boost".to_string());
            }

            let target = if boosting { 320.0 } else { 220.0 };
            self.speed += (target - self.speed) * (2.0 * dt).min(1.0);
            if boosting {
                self.nitro = (self.nitro - 20.0 * dt).max(0.0);
            }

            self.heading += self.steering() * std::f32::consts::PI * dt;
            let dir = Vec2::new(self.heading.cos(), self.heading.sin());
            self.pos += dir * self.speed * dt;
            self.distance += self.speed * dt;
            self.score = (self.distance / 10.0) as u64;
        }

        fn boosting(&self) -> bool {
            self.steering() == 0.0 && self.nitro > 0.0
        }

        /// Events raised since the last captured frame are kept until cleared
        pub fn clear_events(&mut self) {
            self.events.clear();
        }

        pub fn snapshot(&self) -> SimSnapshot {
            let steer = self.steering();
            SimSnapshot {
                pos: self.pos,
                rotation: self.heading,
                speed: self.speed,
                boosting: self.boosting(),
                invincible: false,
                ghost: false,
                nitro: self.nitro,
                camera: CameraFrame {
                    z: 1.0 + self.speed / 1000.0,
                    rotation: self.heading,
                },
                score: ScoreFrame {
                    score: self.score,
                    multiplier: 1.0,
                    combo: 0,
                },
                input: InputFrame {
                    horizontal: steer,
                    vertical: 1.0,
                    boost: self.boosting(),
                    brake: false,
                },
                events: self.events.clone(),
            }
        }
    }
}
