//! Delta compression for replays
//!
//! A compact replay stores the first frame in full; every later frame is a
//! [`FrameDelta`] carrying only the fields that changed since the previous
//! reconstructed frame. Comparisons are exact on the already-rounded values,
//! so `decode(encode(r))` reproduces `r.frames` exactly.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::frame::{CameraFrame, Frame, InputFrame, Replay, ReplayMetadata, ScoreFrame};
use crate::error::ReplayError;

/// Changed-fields-only encoding of a frame relative to its predecessor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameDelta {
    /// Time since the previous frame (ms)
    pub dt: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(rename = "r", default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f32>,
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<i32>,
    #[serde(rename = "b", default, skip_serializing_if = "Option::is_none")]
    pub boosting: Option<bool>,
    #[serde(rename = "i", default, skip_serializing_if = "Option::is_none")]
    pub invincible: Option<bool>,
    #[serde(rename = "g", default, skip_serializing_if = "Option::is_none")]
    pub ghost: Option<bool>,
    #[serde(rename = "n", default, skip_serializing_if = "Option::is_none")]
    pub nitro: Option<i32>,
    #[serde(rename = "cz", default, skip_serializing_if = "Option::is_none")]
    pub camera_z: Option<f32>,
    #[serde(rename = "cr", default, skip_serializing_if = "Option::is_none")]
    pub camera_rotation: Option<f32>,
    #[serde(rename = "sc", default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u64>,
    #[serde(rename = "m", default, skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f32>,
    #[serde(rename = "c", default, skip_serializing_if = "Option::is_none")]
    pub combo: Option<u32>,
    #[serde(rename = "ih", default, skip_serializing_if = "Option::is_none")]
    pub input_horizontal: Option<f32>,
    #[serde(rename = "iv", default, skip_serializing_if = "Option::is_none")]
    pub input_vertical: Option<f32>,
    #[serde(rename = "ib", default, skip_serializing_if = "Option::is_none")]
    pub input_boost: Option<bool>,
    #[serde(rename = "ik", default, skip_serializing_if = "Option::is_none")]
    pub input_brake: Option<bool>,
    #[serde(rename = "e", default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<String>>,
}

#[inline]
fn changed<T: PartialEq + Copy>(prev: T, cur: T) -> Option<T> {
    (prev != cur).then_some(cur)
}

impl FrameDelta {
    /// Diff `cur` against `prev`
    pub fn between(prev: &Frame, cur: &Frame) -> Self {
        // Full destructuring: adding a Frame field without encoding it won't compile
        let Frame {
            t,
            pos,
            rotation,
            speed,
            boosting,
            invincible,
            ghost,
            nitro,
            camera:
                CameraFrame {
                    z: camera_z,
                    rotation: camera_rotation,
                },
            score: ScoreFrame {
                score,
                multiplier,
                combo,
            },
            input:
                InputFrame {
                    horizontal,
                    vertical,
                    boost,
                    brake,
                },
            events,
        } = cur;

        Self {
            dt: t.saturating_sub(prev.t),
            x: changed(prev.pos.x, pos.x),
            y: changed(prev.pos.y, pos.y),
            rotation: changed(prev.rotation, *rotation),
            speed: changed(prev.speed, *speed),
            boosting: changed(prev.boosting, *boosting),
            invincible: changed(prev.invincible, *invincible),
            ghost: changed(prev.ghost, *ghost),
            nitro: changed(prev.nitro, *nitro),
            camera_z: changed(prev.camera.z, *camera_z),
            camera_rotation: changed(prev.camera.rotation, *camera_rotation),
            score: changed(prev.score.score, *score),
            multiplier: changed(prev.score.multiplier, *multiplier),
            combo: changed(prev.score.combo, *combo),
            input_horizontal: changed(prev.input.horizontal, *horizontal),
            input_vertical: changed(prev.input.vertical, *vertical),
            input_boost: changed(prev.input.boost, *boost),
            input_brake: changed(prev.input.brake, *brake),
            events: (!events.is_empty()).then(|| events.clone()),
        }
    }

    /// Rebuild the next frame from the previous reconstructed one
    pub fn apply(&self, prev: &Frame) -> Frame {
        let Self {
            dt,
            x,
            y,
            rotation,
            speed,
            boosting,
            invincible,
            ghost,
            nitro,
            camera_z,
            camera_rotation,
            score,
            multiplier,
            combo,
            input_horizontal,
            input_vertical,
            input_boost,
            input_brake,
            events,
        } = self;

        Frame {
            t: prev.t.saturating_add(*dt),
            pos: Vec2::new(x.unwrap_or(prev.pos.x), y.unwrap_or(prev.pos.y)),
            rotation: rotation.unwrap_or(prev.rotation),
            speed: speed.unwrap_or(prev.speed),
            boosting: boosting.unwrap_or(prev.boosting),
            invincible: invincible.unwrap_or(prev.invincible),
            ghost: ghost.unwrap_or(prev.ghost),
            nitro: nitro.unwrap_or(prev.nitro),
            camera: CameraFrame {
                z: camera_z.unwrap_or(prev.camera.z),
                rotation: camera_rotation.unwrap_or(prev.camera.rotation),
            },
            score: ScoreFrame {
                score: score.unwrap_or(prev.score.score),
                multiplier: multiplier.unwrap_or(prev.score.multiplier),
                combo: combo.unwrap_or(prev.score.combo),
            },
            input: InputFrame {
                horizontal: input_horizontal.unwrap_or(prev.input.horizontal),
                vertical: input_vertical.unwrap_or(prev.input.vertical),
                boost: input_boost.unwrap_or(prev.input.boost),
                brake: input_brake.unwrap_or(prev.input.brake),
            },
            events: events.clone().unwrap_or_default(),
        }
    }

    /// True when only the timestamp moved
    pub fn is_time_only(&self) -> bool {
        *self
            == Self {
                dt: self.dt,
                ..Default::default()
            }
    }
}

/// One element of a compact frame sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompactEntry {
    /// Keyframe (always element 0)
    Full(Frame),
    Delta(FrameDelta),
}

/// Storage form of a replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactReplay {
    pub metadata: ReplayMetadata,
    pub frames: Vec<CompactEntry>,
}

impl CompactReplay {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Deltas that carry nothing but `dt`
    pub fn idle_delta_count(&self) -> usize {
        self.frames
            .iter()
            .filter(|e| matches!(e, CompactEntry::Delta(d) if d.is_time_only()))
            .count()
    }
}

/// Compress a replay. Pure and deterministic.
pub fn encode(replay: &Replay) -> CompactReplay {
    let mut frames = Vec::with_capacity(replay.frames.len());
    let mut prev: Option<&Frame> = None;

    for frame in &replay.frames {
        let entry = match prev {
            None => CompactEntry::Full(frame.clone()),
            Some(p) => CompactEntry::Delta(FrameDelta::between(p, frame)),
        };
        frames.push(entry);
        prev = Some(frame);
    }

    CompactReplay {
        metadata: replay.metadata.clone(),
        frames,
    }
}

/// Expand a compact replay back into full frames
///
/// Any later full entry resets the running state; a sequence that opens with
/// a delta has nothing to apply it to and is rejected.
pub fn decode(compact: &CompactReplay) -> Result<Replay, ReplayError> {
    Ok(Replay {
        metadata: compact.metadata.clone(),
        frames: decode_frames(&compact.frames)?,
    })
}

/// Expand a bare compact frame sequence
///
/// Timestamps must never go backwards; a full entry earlier than the frame
/// before it is rejected.
pub fn decode_frames(entries: &[CompactEntry]) -> Result<Vec<Frame>, ReplayError> {
    let mut frames: Vec<Frame> = Vec::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        let frame = match (entry, frames.last()) {
            (CompactEntry::Full(f), Some(prev)) if f.t < prev.t => {
                return Err(ReplayError::NonMonotonic {
                    index,
                    t: f.t,
                    prev: prev.t,
                });
            }
            (CompactEntry::Full(f), _) => f.clone(),
            (CompactEntry::Delta(d), Some(prev)) => d.apply(prev),
            (CompactEntry::Delta(_), None) => return Err(ReplayError::MissingKeyframe),
        };
        frames.push(frame);
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::frame::{RecordingOptions, SimSnapshot};
    use proptest::prelude::*;

    fn replay_from(frames: Vec<Frame>) -> Replay {
        let mut metadata = RecordingOptions::default().into_metadata(0.0);
        metadata.frame_count = frames.len();
        metadata.duration = frames.last().map(|f| f.t).unwrap_or(0);
        Replay { metadata, frames }
    }

    fn frame_at(t: u32, x: f32) -> Frame {
        let state = SimSnapshot {
            pos: Vec2::new(x, 10.0),
            speed: 120.0,
            nitro: 50.0,
            ..Default::default()
        };
        Frame::capture(&state, t)
    }

    #[test]
    fn test_three_frame_round_trip() {
        let replay = replay_from(vec![frame_at(0, 0.0), frame_at(16, 5.0), frame_at(32, 12.0)]);
        let compact = encode(&replay);

        assert!(matches!(compact.frames[0], CompactEntry::Full(_)));
        assert_eq!(
            compact.frames[1],
            CompactEntry::Delta(FrameDelta {
                dt: 16,
                x: Some(5.0),
                ..Default::default()
            })
        );

        let decoded = decode(&compact).unwrap();
        assert_eq!(decoded.frames[2].pos.x, 12.0);
        assert_eq!(decoded.frames[2].t, 32);
        assert_eq!(decoded.frames, replay.frames);
    }

    #[test]
    fn test_delta_json_is_sparse() {
        let prev = frame_at(0, 0.0);
        let cur = frame_at(16, 5.0);
        let json = serde_json::to_string(&FrameDelta::between(&prev, &cur)).unwrap();
        assert_eq!(json, r#"{"dt":16,"x":5.0}"#);
    }

    #[test]
    fn test_events_only_when_present() {
        let prev = frame_at(0, 0.0);
        let mut cur = frame_at(16, 0.0);
        assert!(FrameDelta::between(&prev, &cur).events.is_none());
        assert!(FrameDelta::between(&prev, &cur).is_time_only());

        cur.events = vec!["drift".to_string(), "boost_pad".to_string()];
        let delta = FrameDelta::between(&prev, &cur);
        assert_eq!(delta.events, Some(cur.events.clone()));

        // Events don't carry over to the next reconstructed frame
        let next = FrameDelta { dt: 16, ..Default::default() }.apply(&delta.apply(&prev));
        assert!(next.events.is_empty());
    }

    #[test]
    fn test_encode_is_deterministic() {
        let replay = replay_from(vec![frame_at(0, 1.0), frame_at(20, 2.0), frame_at(40, 2.0)]);
        assert_eq!(encode(&replay), encode(&replay));
        assert_eq!(encode(&replay).idle_delta_count(), 1);
    }

    #[test]
    fn test_decode_empty() {
        let compact = encode(&replay_from(Vec::new()));
        assert!(compact.is_empty());
        let decoded = decode(&compact).unwrap();
        assert!(decoded.frames.is_empty());
    }

    #[test]
    fn test_decode_rejects_leading_delta() {
        let compact = CompactReplay {
            metadata: RecordingOptions::default().into_metadata(0.0),
            frames: vec![CompactEntry::Delta(FrameDelta::default())],
        };
        assert!(matches!(decode(&compact), Err(ReplayError::MissingKeyframe)));
    }

    #[test]
    fn test_later_keyframe_resyncs() {
        let entries = vec![
            CompactEntry::Full(frame_at(0, 0.0)),
            CompactEntry::Delta(FrameDelta {
                dt: 16,
                x: Some(5.0),
                ..Default::default()
            }),
            CompactEntry::Full(frame_at(40, 30.0)),
            CompactEntry::Delta(FrameDelta {
                dt: 16,
                ..Default::default()
            }),
        ];
        let frames = decode_frames(&entries).unwrap();
        let ts: Vec<u32> = frames.iter().map(|f| f.t).collect();
        assert_eq!(ts, vec![0, 16, 40, 56]);
        assert_eq!(frames[3].pos.x, 30.0);
    }

    #[test]
    fn test_keyframe_going_back_in_time_rejected() {
        let entries = vec![
            CompactEntry::Full(frame_at(100, 0.0)),
            CompactEntry::Delta(FrameDelta {
                dt: 16,
                ..Default::default()
            }),
            CompactEntry::Full(frame_at(5, 0.0)),
        ];
        assert!(matches!(
            decode_frames(&entries),
            Err(ReplayError::NonMonotonic {
                index: 2,
                t: 5,
                prev: 116
            })
        ));
    }

    #[test]
    fn test_compact_json_round_trip() {
        let mut frames = vec![frame_at(0, 0.0), frame_at(16, 5.0), frame_at(33, 5.0)];
        frames[2].boosting = true;
        frames[2].events = vec!["boost".to_string()];
        let compact = encode(&replay_from(frames));

        let json = serde_json::to_string(&compact).unwrap();
        let back: CompactReplay = serde_json::from_str(&json).unwrap();
        assert_eq!(back, compact);
        assert!(matches!(back.frames[0], CompactEntry::Full(_)));
        assert!(matches!(back.frames[2], CompactEntry::Delta(_)));
    }

    prop_compose! {
        fn arb_snapshot()(
            x in -5000.0f32..5000.0,
            y in -5000.0f32..5000.0,
            rotation in -7.0f32..7.0,
            speed in 0.0f32..600.0,
            flags in any::<(bool, bool, bool)>(),
            nitro in 0.0f32..100.0,
            score in 0u64..1_000_000,
            combo in 0u32..50,
            steer in -1.0f32..1.0,
            event in proptest::option::of("[a-z_]{1,8}"),
        ) -> SimSnapshot {
            SimSnapshot {
                pos: Vec2::new(x, y),
                rotation,
                speed,
                boosting: flags.0,
                invincible: flags.1,
                ghost: flags.2,
                nitro,
                score: ScoreFrame { score, multiplier: 1.0 + combo as f32 * 0.1, combo },
                input: InputFrame { horizontal: steer, ..Default::default() },
                events: event.into_iter().collect(),
                ..Default::default()
            }
        }
    }

    fn arb_frames() -> impl Strategy<Value = Vec<Frame>> {
        proptest::collection::vec((0u32..50, arb_snapshot()), 1..60).prop_map(|steps| {
            let mut t = 0;
            steps
                .into_iter()
                .map(|(dt, state)| {
                    t += dt;
                    Frame::capture(&state, t)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_round_trip(frames in arb_frames()) {
            let replay = replay_from(frames);
            let decoded = decode(&encode(&replay)).unwrap();
            prop_assert_eq!(&decoded.frames, &replay.frames);
            prop_assert!(decoded.is_time_ordered());
        }

        #[test]
        fn prop_first_entry_is_keyframe(frames in arb_frames()) {
            let compact = encode(&replay_from(frames.clone()));
            prop_assert_eq!(compact.len(), frames.len());
            prop_assert_eq!(&compact.frames[0], &CompactEntry::Full(frames[0].clone()));
        }
    }
}
