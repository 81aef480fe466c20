//! Error types for replay recording, playback and storage

use thiserror::Error;

/// Failures of the key/value store backing saved replays
#[derive(Debug, Error)]
pub enum StorageError {
    /// Write rejected because the store is full
    #[error("storage quota exceeded writing '{key}' ({bytes} bytes)")]
    QuotaExceeded { key: String, bytes: usize },
    /// Store not reachable (no window, storage disabled, ...)
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("failed to encode replays: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors surfaced by the replay subsystem
///
/// None of these are fatal; callers decide whether to show or log them.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("no replay loaded")]
    NoReplayLoaded,

    #[error("replay has no frames")]
    EmptyReplay,

    #[error("compact replay does not start with a full frame")]
    MissingKeyframe,

    #[error("frame {index} goes back in time ({t} ms after {prev} ms)")]
    NonMonotonic { index: usize, t: u32, prev: u32 },

    #[error("replay data is missing '{0}'")]
    MissingField(&'static str),

    #[error("replay '{0}' not found")]
    NotFound(String),

    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid replay json: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
