//! Interpolated replay playback
//!
//! A virtual playback clock advances by `delta * speed` every render tick.
//! The frame cursor only ever scans forward during `update`; seeks reposition
//! it explicitly. Continuous fields are lerped between the two bracketing
//! frames while discrete ones (flags, score, input, events) snap to the later
//! frame.

use glam::Vec2;
use serde::Serialize;

use super::events::ReplayEvent;
use super::frame::{CameraFrame, Frame, InputFrame, Replay, ScoreFrame};
use crate::consts::*;
use crate::error::ReplayError;
use crate::lerp;

/// Player lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
    /// Clock reached the last frame
    Complete,
}

/// What the host should draw for the current tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderState {
    /// Playback clock (ms)
    pub time: f64,
    /// Index of the earlier bracketing frame
    pub cursor: usize,
    /// Interpolation fraction between `cursor` and `cursor + 1` (0-1)
    pub fraction: f32,
    pub pos: Vec2,
    pub rotation: f32,
    pub speed: f32,
    pub nitro: f32,
    pub camera: CameraFrame,
    pub boosting: bool,
    pub invincible: bool,
    pub ghost: bool,
    pub score: ScoreFrame,
    pub input: InputFrame,
    pub events: Vec<String>,
}

impl RenderState {
    /// Blend two frames; `b` wins for everything that isn't continuous
    pub fn between(a: &Frame, b: &Frame, fraction: f32, time: f64, cursor: usize) -> Self {
        Self {
            time,
            cursor,
            fraction,
            pos: a.pos.lerp(b.pos, fraction),
            rotation: lerp(a.rotation, b.rotation, fraction),
            speed: lerp(a.speed as f32, b.speed as f32, fraction),
            nitro: lerp(a.nitro as f32, b.nitro as f32, fraction),
            camera: CameraFrame {
                z: lerp(a.camera.z, b.camera.z, fraction),
                rotation: lerp(a.camera.rotation, b.camera.rotation, fraction),
            },
            boosting: b.boosting,
            invincible: b.invincible,
            ghost: b.ghost,
            score: b.score,
            input: b.input,
            events: b.events.clone(),
        }
    }
}

/// Drives playback of one loaded replay
#[derive(Debug)]
pub struct Player {
    replay: Option<Replay>,
    state: PlaybackState,
    speed: f32,
    playback_time: f64,
    cursor: usize,
    events: Vec<ReplayEvent>,
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

impl Player {
    pub fn new() -> Self {
        Self {
            replay: None,
            state: PlaybackState::Idle,
            speed: 1.0,
            playback_time: 0.0,
            cursor: 0,
            events: Vec::new(),
        }
    }

    /// Load a replay, stopping whatever was playing
    pub fn load(&mut self, replay: Replay) {
        log::info!(
            "Loaded replay {} ({} frames)",
            replay.metadata.id,
            replay.frames.len()
        );
        self.replay = Some(replay);
        self.state = PlaybackState::Idle;
        self.playback_time = 0.0;
        self.cursor = 0;
    }

    /// Start (or restart) from the beginning
    pub fn start_playback(&mut self, speed: f32) -> Result<(), ReplayError> {
        let Some(replay) = &self.replay else {
            log::warn!("Cannot start playback: no replay loaded");
            return Err(ReplayError::NoReplayLoaded);
        };
        if replay.is_empty() {
            log::warn!("Cannot start playback: replay {} is empty", replay.metadata.id);
            return Err(ReplayError::EmptyReplay);
        }

        let id = replay.metadata.id.clone();
        self.speed = clamp_speed(speed);
        self.playback_time = 0.0;
        self.cursor = 0;
        self.state = PlaybackState::Playing;

        log::info!("Playback started: {} at {}x", id, self.speed);
        self.events.push(ReplayEvent::PlaybackStarted {
            id,
            speed: self.speed,
        });
        Ok(())
    }

    pub fn pause_playback(&mut self) -> bool {
        if self.state != PlaybackState::Playing {
            return false;
        }
        self.state = PlaybackState::Paused;
        self.events.push(ReplayEvent::PlaybackPaused);
        true
    }

    pub fn resume_playback(&mut self) -> bool {
        if self.state != PlaybackState::Paused {
            return false;
        }
        self.state = PlaybackState::Playing;
        self.events.push(ReplayEvent::PlaybackResumed);
        true
    }

    /// Return to Idle, keeping the replay loaded
    pub fn stop_playback(&mut self) -> bool {
        if self.state == PlaybackState::Idle {
            return false;
        }
        self.state = PlaybackState::Idle;
        self.playback_time = 0.0;
        self.cursor = 0;
        log::info!("Playback stopped");
        self.events.push(ReplayEvent::PlaybackStopped);
        true
    }

    /// Set speed, clamped to [0.25, 4.0]. Applies from the next tick.
    pub fn set_playback_speed(&mut self, speed: f32) -> f32 {
        self.speed = clamp_speed(speed);
        self.events.push(ReplayEvent::SpeedChanged { speed: self.speed });
        self.speed
    }

    /// Jump to the last frame at or before `time_ms`
    ///
    /// Seeking back from Complete leaves the player Paused at the target;
    /// seeking to the very end keeps it Complete.
    pub fn seek_to(&mut self, time_ms: f64) -> bool {
        if self.state == PlaybackState::Idle || !time_ms.is_finite() {
            return false;
        }
        let Some(replay) = &self.replay else {
            return false;
        };

        let duration = replay.duration() as f64;
        let target = time_ms.clamp(0.0, duration);
        self.cursor = replay
            .frames
            .partition_point(|f| f.t as f64 <= target)
            .saturating_sub(1);
        self.playback_time = target;

        if self.state == PlaybackState::Complete && target < duration {
            self.state = PlaybackState::Paused;
        }

        self.events.push(ReplayEvent::Seeked {
            time_ms: target as u32,
            cursor: self.cursor,
        });
        true
    }

    /// Jump to a fraction (0-1) of the replay's duration
    pub fn seek_to_percent(&mut self, ratio: f64) -> bool {
        if !ratio.is_finite() {
            return false;
        }
        let Some(duration) = self.replay.as_ref().map(|r| r.duration()) else {
            return false;
        };
        self.seek_to(duration as f64 * ratio.clamp(0.0, 1.0))
    }

    /// Advance the clock by `delta` ms of real time and interpolate
    ///
    /// A negative or non-finite `delta` does not move the clock.
    pub fn update(&mut self, delta: f64) -> Option<RenderState> {
        if self.state != PlaybackState::Playing {
            return None;
        }
        let replay = self.replay.as_ref()?;
        let frames = &replay.frames;
        let last = frames.len().checked_sub(1)?;

        if delta.is_finite() && delta > 0.0 {
            self.playback_time += delta * self.speed as f64;
        }

        while self.cursor < last && frames[self.cursor + 1].t as f64 <= self.playback_time {
            self.cursor += 1;
        }

        if self.cursor >= last {
            self.state = PlaybackState::Complete;
            log::info!("Playback complete: {}", replay.metadata.id);
            self.events.push(ReplayEvent::PlaybackComplete {
                id: replay.metadata.id.clone(),
            });
            return None;
        }

        let a = &frames[self.cursor];
        let b = &frames[self.cursor + 1];
        let span = b.t.saturating_sub(a.t) as f64;
        let fraction = if span > 0.0 {
            ((self.playback_time - a.t as f64) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };

        Some(RenderState::between(
            a,
            b,
            fraction as f32,
            self.playback_time,
            self.cursor,
        ))
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn playback_time(&self) -> f64 {
        self.playback_time
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn replay(&self) -> Option<&Replay> {
        self.replay.as_ref()
    }

    /// Playback position as a fraction of duration (0-1)
    pub fn progress(&self) -> f64 {
        match &self.replay {
            None => 0.0,
            Some(_) if self.state == PlaybackState::Complete => 1.0,
            Some(r) if r.duration() == 0 => 0.0,
            Some(r) => (self.playback_time / r.duration() as f64).clamp(0.0, 1.0),
        }
    }

    /// Take queued notifications
    pub fn drain_events(&mut self) -> Vec<ReplayEvent> {
        std::mem::take(&mut self.events)
    }
}

fn clamp_speed(speed: f32) -> f32 {
    if speed.is_nan() {
        return 1.0;
    }
    speed.clamp(MIN_PLAYBACK_SPEED, MAX_PLAYBACK_SPEED)
}

/// Format a playback time as `m:ss.cc`
pub fn format_time(ms: f64) -> String {
    let total_centis = (ms.max(0.0) / 10.0).floor() as u64;
    let minutes = total_centis / 6000;
    let seconds = (total_centis / 100) % 60;
    let centis = total_centis % 100;
    format!("{}:{:02}.{:02}", minutes, seconds, centis)
}
