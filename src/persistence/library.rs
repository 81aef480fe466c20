//! Saved replay library
//!
//! Persisted to a `KeyValueStore` as one JSON array of delta-compressed
//! replays, newest first, capped at `max_saved` entries.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::KeyValueStore;
use crate::error::{ReplayError, StorageError};
use crate::replay::{CompactEntry, Replay, ReplayMetadata, decode_frames, encode, format_time};

/// Storage key for the saved replay list
pub const REPLAYS_KEY: &str = "neon_drift_replays";

/// Name prefix applied to imported replays
const IMPORT_PREFIX: &str = "Imported: ";

/// A stored, delta-compressed replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedReplay {
    pub id: String,
    pub name: String,
    /// Unix timestamp (ms) when saved
    pub saved_at: f64,
    pub metadata: ReplayMetadata,
    /// Keyframe followed by deltas
    pub frames: Vec<CompactEntry>,
}

impl SavedReplay {
    /// Expand back into a playable replay
    pub fn decode(&self) -> Result<Replay, ReplayError> {
        Ok(Replay {
            metadata: self.metadata.clone(),
            frames: decode_frames(&self.frames)?,
        })
    }
}

/// Shape accepted by `import`; `id` and `savedAt` are reassigned
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportedReplay {
    #[serde(default)]
    name: Option<String>,
    metadata: ReplayMetadata,
    frames: Vec<CompactEntry>,
}

/// Bounded list of saved replays backed by a key/value store
pub struct ReplayLibrary<S: KeyValueStore> {
    store: S,
    saved: Vec<SavedReplay>,
    max_saved: usize,
    rng: Pcg32,
}

impl<S: KeyValueStore> ReplayLibrary<S> {
    /// Open the library, seeding id generation from the clock
    pub fn open(store: S, max_saved: usize) -> Self {
        Self::with_seed(store, max_saved, crate::platform::now_ms() as u64)
    }

    /// Open with a fixed id seed (reproducible ids)
    pub fn with_seed(store: S, max_saved: usize, seed: u64) -> Self {
        let saved = Self::load_saved(&store);
        Self {
            store,
            saved,
            max_saved: max_saved.max(1),
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    fn load_saved(store: &S) -> Vec<SavedReplay> {
        let Some(json) = store.get(REPLAYS_KEY) else {
            log::info!("No saved replays found, starting fresh");
            return Vec::new();
        };

        match serde_json::from_str::<Vec<SavedReplay>>(&json) {
            Ok(saved) => {
                log::info!("Loaded {} saved replays", saved.len());
                saved
            }
            Err(e) => {
                log::warn!("Saved replays unreadable, starting fresh: {}", e);
                Vec::new()
            }
        }
    }

    /// Compress and store a replay. Returns the saved id, or None if storage
    /// refused it even after evicting the oldest entry.
    pub fn save(&mut self, replay: &Replay, name: Option<&str>, now: f64) -> Option<String> {
        let compact = encode(replay);
        let entry = SavedReplay {
            id: self.next_id(now),
            name: name
                .map(str::to_string)
                .unwrap_or_else(|| default_name(&replay.metadata)),
            saved_at: now,
            metadata: compact.metadata,
            frames: compact.frames,
        };

        match self.insert(entry) {
            Ok(id) => Some(id),
            Err(e) => {
                log::warn!("Replay save dropped: {}", e);
                None
            }
        }
    }

    /// Add an entry at the front, trim to capacity and persist.
    /// On failure the list is restored to its previous contents.
    fn insert(&mut self, entry: SavedReplay) -> Result<String, StorageError> {
        let id = entry.id.clone();
        let mut evicted = Vec::new();

        self.saved.insert(0, entry);
        while self.saved.len() > self.max_saved {
            if let Some(oldest) = self.saved.pop() {
                evicted.push(oldest);
            }
        }

        let mut result = self.persist();
        if let Err(e) = &result {
            if self.saved.len() > 1 {
                if let Some(oldest) = self.saved.pop() {
                    log::warn!(
                        "Storage write failed ({}), evicting oldest replay {} and retrying",
                        e,
                        oldest.id
                    );
                    evicted.push(oldest);
                    result = self.persist();
                }
            }
        }

        match result {
            Ok(()) => {
                for old in &evicted {
                    log::info!("Evicted saved replay {} ({})", old.id, old.name);
                }
                log::info!("Replay saved: {} ({} stored)", id, self.saved.len());
                Ok(id)
            }
            Err(e) => {
                self.saved.remove(0);
                while let Some(old) = evicted.pop() {
                    self.saved.push(old);
                }
                Err(e)
            }
        }
    }

    fn persist(&mut self) -> Result<(), StorageError> {
        let json = serde_json::to_string(&self.saved)?;
        log::debug!("Writing {} replays ({} bytes)", self.saved.len(), json.len());
        self.store.set(REPLAYS_KEY, &json)
    }

    fn next_id(&mut self, now: f64) -> String {
        let suffix: String = (0..6)
            .map(|_| std::char::from_digit(self.rng.random_range(0..36), 36).unwrap_or('0'))
            .collect();
        format!("replay_{}_{}", now.max(0.0) as u64, suffix)
    }

    /// Saved replays, newest first
    pub fn list(&self) -> &[SavedReplay] {
        &self.saved
    }

    pub fn len(&self) -> usize {
        self.saved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }

    pub fn max_saved(&self) -> usize {
        self.max_saved
    }

    /// Change capacity; takes effect on the next save
    pub fn set_max_saved(&mut self, max_saved: usize) {
        self.max_saved = max_saved.max(1);
    }

    pub fn get(&self, id: &str) -> Option<&SavedReplay> {
        self.saved.iter().find(|r| r.id == id)
    }

    /// Decode a saved replay for playback
    pub fn load(&self, id: &str) -> Result<Replay, ReplayError> {
        self.get(id)
            .ok_or_else(|| ReplayError::NotFound(id.to_string()))?
            .decode()
    }

    /// Remove a saved replay. Returns false if it wasn't there.
    pub fn delete(&mut self, id: &str) -> bool {
        let Some(index) = self.saved.iter().position(|r| r.id == id) else {
            return false;
        };
        let removed = self.saved.remove(index);
        if let Err(e) = self.persist() {
            log::warn!("Failed to persist deletion of {}: {}", removed.id, e);
        }
        log::info!("Deleted saved replay {}", removed.id);
        true
    }

    /// Remove every saved replay
    pub fn clear(&mut self) {
        self.saved.clear();
        self.store.remove(REPLAYS_KEY);
        log::info!("Saved replays cleared");
    }

    /// Best completed run on a level (highest score), for ghost racing
    pub fn best_for_level(&self, level: u32) -> Option<&SavedReplay> {
        self.saved
            .iter()
            .filter(|r| r.metadata.level == level && r.metadata.stats.completed)
            .max_by_key(|r| r.metadata.stats.score)
    }

    /// Base64-encoded JSON of one saved replay
    pub fn export(&self, id: &str) -> Option<String> {
        let entry = self.get(id)?;
        match serde_json::to_string(entry) {
            Ok(json) => Some(STANDARD.encode(json)),
            Err(e) => {
                log::warn!("Failed to export replay {}: {}", id, e);
                None
            }
        }
    }

    /// Import a base64 export under a fresh id. Nothing changes on failure.
    pub fn import(&mut self, data: &str, now: f64) -> Result<String, ReplayError> {
        let bytes = STANDARD.decode(data.trim())?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        for field in ["metadata", "frames"] {
            if value.get(field).is_none() {
                log::warn!("Import rejected: missing '{}'", field);
                return Err(ReplayError::MissingField(field));
            }
        }

        let imported: ImportedReplay = serde_json::from_value(value)?;
        // Reject sequences that can't be played back
        decode_frames(&imported.frames)?;

        let base_name = imported
            .name
            .unwrap_or_else(|| default_name(&imported.metadata));
        let entry = SavedReplay {
            id: self.next_id(now),
            name: format!("{}{}", IMPORT_PREFIX, base_name),
            saved_at: now,
            metadata: imported.metadata,
            frames: imported.frames,
        };

        let id = self.insert(entry)?;
        log::info!("Imported replay {}", id);
        Ok(id)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}

fn default_name(metadata: &ReplayMetadata) -> String {
    format!(
        "Level {} - {}",
        metadata.level,
        format_time(metadata.duration as f64)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use crate::replay::{FinalStats, Frame, RecordingOptions, SimSnapshot};
    use glam::Vec2;

    fn sample_replay(level: u32, score: u64, completed: bool) -> Replay {
        let frames: Vec<Frame> = (0..4)
            .map(|i| {
                let state = SimSnapshot {
                    pos: Vec2::new(i as f32 * 3.0, 0.0),
                    speed: 150.0,
                    ..Default::default()
                };
                Frame::capture(&state, i * 16)
            })
            .collect();
        let mut metadata = RecordingOptions::new(level, "viper").into_metadata(1000.0);
        metadata.duration = 48;
        metadata.frame_count = frames.len();
        metadata.stats = FinalStats {
            score,
            completed,
            ..Default::default()
        };
        Replay { metadata, frames }
    }

    fn library() -> ReplayLibrary<MemoryStore> {
        ReplayLibrary::with_seed(MemoryStore::new(), 3, 42)
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let mut lib = library();
        let replay = sample_replay(1, 100, true);
        let id = lib.save(&replay, Some("Best lap"), 2000.0).unwrap();

        assert!(id.starts_with("replay_2000_"));
        assert_eq!(lib.get(&id).unwrap().name, "Best lap");
        assert_eq!(lib.load(&id).unwrap(), replay);

        // Persisted: a fresh library over the same store sees it
        let store = lib.store().clone();
        let reopened = ReplayLibrary::with_seed(store, 3, 1);
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.load(&id).unwrap().frames, replay.frames);
    }

    #[test]
    fn test_default_name() {
        let mut lib = library();
        let id = lib.save(&sample_replay(2, 0, false), None, 0.0).unwrap();
        assert_eq!(lib.get(&id).unwrap().name, "Level 2 - 0:00.04");
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut lib = library();
        let ids: Vec<String> = (0..4)
            .map(|i| lib.save(&sample_replay(1, i, true), None, i as f64).unwrap())
            .collect();

        assert_eq!(lib.len(), 3);
        assert!(lib.get(&ids[0]).is_none());
        assert_eq!(lib.list()[0].id, ids[3]);
    }

    #[test]
    fn test_quota_failure_evicts_and_retries() {
        let mut lib = library();
        let first = lib.save(&sample_replay(1, 1, true), None, 1.0).unwrap();
        let used = lib.store().used_bytes();

        // Room for one replay, not two
        lib.store_mut().set_quota(Some(used + used / 2));
        let second = lib.save(&sample_replay(1, 2, true), None, 2.0).unwrap();

        assert_eq!(lib.len(), 1);
        assert!(lib.get(&first).is_none());
        assert!(lib.get(&second).is_some());
    }

    #[test]
    fn test_quota_failure_drops_save_silently() {
        let mut lib = library();
        let first = lib.save(&sample_replay(1, 1, true), None, 1.0).unwrap();
        lib.store_mut().set_quota(Some(10));

        assert!(lib.save(&sample_replay(1, 2, true), None, 2.0).is_none());
        assert_eq!(lib.len(), 1);
        assert!(lib.get(&first).is_some());
    }

    #[test]
    fn test_delete_and_clear() {
        let mut lib = library();
        let a = lib.save(&sample_replay(1, 1, true), None, 1.0).unwrap();
        let b = lib.save(&sample_replay(1, 2, true), None, 2.0).unwrap();

        assert!(lib.delete(&a));
        assert!(!lib.delete(&a));
        assert_eq!(lib.len(), 1);
        assert!(matches!(lib.load(&a), Err(ReplayError::NotFound(_))));

        lib.clear();
        assert!(lib.is_empty());
        assert!(lib.get(&b).is_none());
        assert!(lib.store().get(REPLAYS_KEY).is_none());
    }

    #[test]
    fn test_best_for_level() {
        let mut lib = ReplayLibrary::with_seed(MemoryStore::new(), 10, 7);
        lib.save(&sample_replay(1, 500, true), Some("ok"), 1.0);
        let best = lib.save(&sample_replay(1, 900, true), Some("best"), 2.0).unwrap();
        lib.save(&sample_replay(1, 2000, false), Some("crashed"), 3.0);
        lib.save(&sample_replay(2, 5000, true), Some("other level"), 4.0);

        assert_eq!(lib.best_for_level(1).unwrap().id, best);
        assert!(lib.best_for_level(3).is_none());
    }

    #[test]
    fn test_export_import_round_trip() {
        let mut lib = library();
        let id = lib.save(&sample_replay(1, 10, true), Some("Run"), 1.0).unwrap();
        let exported = lib.export(&id).unwrap();

        let imported = lib.import(&exported, 5.0).unwrap();
        assert_ne!(imported, id);
        let entry = lib.get(&imported).unwrap();
        assert_eq!(entry.name, "Imported: Run");
        assert_eq!(entry.saved_at, 5.0);
        assert_eq!(lib.load(&imported).unwrap().frames, lib.load(&id).unwrap().frames);
    }

    #[test]
    fn test_import_rejects_missing_fields() {
        let mut lib = library();
        lib.save(&sample_replay(1, 10, true), None, 1.0).unwrap();
        let before = lib.list().to_vec();

        let data = STANDARD.encode(r#"{"foo": 1}"#);
        assert!(matches!(
            lib.import(&data, 2.0),
            Err(ReplayError::MissingField("metadata"))
        ));
        assert_eq!(lib.list(), before.as_slice());
    }

    #[test]
    fn test_import_rejects_frames_going_backwards() {
        let mut lib = library();
        let id = lib.save(&sample_replay(1, 10, true), None, 1.0).unwrap();
        let before = lib.list().to_vec();

        let mut entry = lib.get(&id).unwrap().clone();
        let mut rewound = entry.decode().unwrap().frames[0].clone();
        rewound.t = 5;
        let first = match &mut entry.frames[0] {
            CompactEntry::Full(f) => f,
            CompactEntry::Delta(_) => panic!("expected keyframe"),
        };
        first.t = 100;
        entry.frames.push(CompactEntry::Full(rewound));

        let data = STANDARD.encode(serde_json::to_string(&entry).unwrap());
        assert!(matches!(
            lib.import(&data, 2.0),
            Err(ReplayError::NonMonotonic { t: 5, .. })
        ));
        assert_eq!(lib.list(), before.as_slice());
    }

    #[test]
    fn test_import_rejects_garbage() {
        let mut lib = library();
        assert!(matches!(
            lib.import("not base64!!", 0.0),
            Err(ReplayError::Base64(_))
        ));
        assert!(matches!(
            lib.import(&STANDARD.encode("not json"), 0.0),
            Err(ReplayError::Json(_))
        ));
        assert!(lib.is_empty());
    }

    #[test]
    fn test_corrupt_store_starts_fresh() {
        let mut store = MemoryStore::new();
        store.set(REPLAYS_KEY, "{broken").unwrap();
        let lib = ReplayLibrary::with_seed(store, 3, 0);
        assert!(lib.is_empty());
    }
}
