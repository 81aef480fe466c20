//! Replay recording and playback
//!
//! Pipeline:
//! - `recorder`: samples live state into rounded frames (throttled, capacity-bounded)
//! - `codec`: delta-encodes frames for storage and decodes them back exactly
//! - `playback`: interpolates decoded frames against a virtual clock
//!
//! Nothing here touches a renderer or storage; hosts feed snapshots in and
//! draw the returned [`RenderState`].

pub mod codec;
pub mod events;
pub mod frame;
pub mod playback;
pub mod recorder;

pub use codec::{CompactEntry, CompactReplay, FrameDelta, decode, decode_frames, encode};
pub use events::ReplayEvent;
pub use frame::{
    CameraFrame, FinalStats, Frame, InputFrame, RecordingOptions, Replay, ReplayMetadata,
    ScoreFrame, SimSnapshot,
};
pub use playback::{PlaybackState, Player, RenderState, format_time};
pub use recorder::{Recorder, RecorderState};
