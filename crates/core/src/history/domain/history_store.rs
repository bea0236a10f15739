use std::collections::VecDeque;

use crate::detection::domain::detection::{Detection, Keypoint};
use crate::history::domain::keypoint_index::KeypointIndex;
use crate::shared::constants::HISTORY_CAPACITY;

/// Bounded, insertion-ordered record of the most recent detections.
///
/// Holds at most `capacity` entries; appending past that evicts from the
/// head, oldest first, without reordering what remains. Appends are ignored
/// while recording is off. Every operation is total: out-of-range lookups
/// return `None`.
#[derive(Clone, Debug)]
pub struct HistoryStore {
    entries: VecDeque<Detection>,
    capacity: usize,
    recording: bool,
}

impl HistoryStore {
    /// A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            recording: false,
        }
    }

    pub fn set_recording(&mut self, enabled: bool) {
        if self.recording != enabled {
            log::debug!(
                "History recording {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
        self.recording = enabled;
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Returns true if the detection was stored.
    pub fn append(&mut self, detection: Option<Detection>) -> bool {
        let Some(detection) = detection else {
            return false;
        };
        if !self.recording {
            return false;
        }
        self.entries.push_back(detection);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &Detection> {
        self.entries.iter()
    }

    pub fn get(&self, entry_index: usize) -> Option<&Detection> {
        self.entries.get(entry_index)
    }

    pub fn latest(&self) -> Option<&Detection> {
        self.entries.back()
    }

    /// Coordinates of one landmark in one entry.
    ///
    /// Takes any integer type so that negative indices resolve to `None`
    /// instead of failing to convert at the call site.
    pub fn query_keypoint<E, K>(&self, entry_index: E, keypoint_index: K) -> Option<Keypoint>
    where
        E: TryInto<usize>,
        K: TryInto<usize>,
    {
        let entry = self.entries.get(entry_index.try_into().ok()?)?;
        entry.keypoint(keypoint_index.try_into().ok()?)
    }

    /// One landmark across every entry, oldest first.
    pub fn track_keypoint(&self, index: KeypointIndex) -> Vec<Keypoint> {
        self.entries
            .iter()
            .filter_map(|d| d.keypoint(index.get()))
            .collect()
    }

    pub fn to_vec(&self) -> Vec<Detection> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}
