use std::collections::HashMap;

use serde::Serialize;

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct NoteHistoryEntry {
    pub count: u32,
    pub first_seen: f64,
    pub last_seen: f64,
    pub total_duration: f64,
    /// Already emitted as a new onset.
    pub reported: bool,
}

impl NoteHistoryEntry {
    fn fresh(now: f64) -> Self {
        NoteHistoryEntry {
            count: 1,
            first_seen: now,
            last_seen: now,
            total_duration: 0.0,
            reported: false,
        }
    }
}

/// Per-pitch short-term history. A detection must recur (or persist long
/// enough) before it is trusted as a note.
#[derive(Debug, Clone)]
pub struct NoteHistory {
    entries: HashMap<i32, NoteHistoryEntry>,
    hop_size_ms: f64,
    persistence_frames: u32,
    min_duration_ms: f64,
}

impl NoteHistory {
    pub fn new(hop_size_ms: f64, persistence_frames: u32, min_duration_ms: f64) -> Self {
        NoteHistory {
            entries: HashMap::new(),
            hop_size_ms,
            persistence_frames,
            min_duration_ms,
        }
    }

    fn continuation_gap(&self) -> f64 {
        self.hop_size_ms * 3.0
    }

    fn eviction_gap(&self) -> f64 {
        self.hop_size_ms * 5.0
    }

    /// Record that `pitch` was detected at `now` and return its entry.
    pub fn observe(&mut self, pitch: i32, now: f64) -> &NoteHistoryEntry {
        let continuation_gap = self.continuation_gap();
        let entry = self
            .entries
            .entry(pitch)
            .or_insert_with(|| NoteHistoryEntry::fresh(now));

        // A just-inserted entry has last_seen == now and count == 1.
        let gap = now - entry.last_seen;
        if gap > 0.0 {
            if gap < continuation_gap {
                entry.count += 1;
                entry.total_duration += gap;
                entry.last_seen = now;
            } else {
                *entry = NoteHistoryEntry::fresh(now);
            }
        }
        entry
    }

    pub fn is_valid(&self, entry: &NoteHistoryEntry) -> bool {
        entry.count >= self.persistence_frames || entry.total_duration >= self.min_duration_ms
    }

    pub fn mark_reported(&mut self, pitch: i32) {
        if let Some(entry) = self.entries.get_mut(&pitch) {
            entry.reported = true;
        }
    }

    /// Drop entries for pitches not detected this tick whose gap exceeds
    /// the eviction window.
    pub fn prune(&mut self, detected: &[i32], now: f64) {
        let eviction_gap = self.eviction_gap();
        self.entries
            .retain(|pitch, entry| detected.contains(pitch) || now - entry.last_seen <= eviction_gap);
    }

    pub fn remove(&mut self, pitch: i32) {
        self.entries.remove(&pitch);
    }

    pub fn get(&self, pitch: i32) -> Option<&NoteHistoryEntry> {
        self.entries.get(&pitch)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
