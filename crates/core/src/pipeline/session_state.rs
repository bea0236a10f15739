use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::detection::domain::detection::{Detection, Keypoint};
use crate::history::domain::history_store::HistoryStore;
use crate::history::domain::keypoint_index::KeypointIndex;
use crate::shared::live_config::LiveConfig;

/// State shared between the loop's worker thread and the host.
///
/// History appends from the loop and host commands such as `clear` go through
/// one lock, so FIFO order always holds. The frame rate and model flag are
/// plain atomics that the loop publishes and the host reads.
#[derive(Debug)]
pub struct SessionState {
    history: Mutex<HistoryStore>,
    selected: Mutex<Option<KeypointIndex>>,
    fps: AtomicU32,
    model_loaded: AtomicBool,
}

impl SessionState {
    pub fn new(history: HistoryStore) -> Self {
        Self {
            history: Mutex::new(history),
            selected: Mutex::new(None),
            fps: AtomicU32::new(0),
            model_loaded: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &LiveConfig) -> Self {
        let mut history = HistoryStore::new(config.history_capacity);
        history.set_recording(config.record_on_start);
        Self::new(history)
    }

    pub fn set_recording(&self, enabled: bool) {
        self.history().set_recording(enabled);
    }

    pub fn is_recording(&self) -> bool {
        self.history().is_recording()
    }

    pub fn clear_history(&self) {
        self.history().clear();
    }

    /// `None` turns highlighting off.
    pub fn set_selected_keypoint(&self, index: Option<KeypointIndex>) {
        *lock(&self.selected) = index;
    }

    pub fn selected_keypoint(&self) -> Option<KeypointIndex> {
        *lock(&self.selected)
    }

    pub fn current_fps(&self) -> u32 {
        self.fps.load(Ordering::Relaxed)
    }

    pub fn publish_fps(&self, fps: u32) {
        self.fps.store(fps, Ordering::Relaxed);
    }

    pub fn is_model_loaded(&self) -> bool {
        self.model_loaded.load(Ordering::Acquire)
    }

    pub fn mark_model_loaded(&self) {
        self.model_loaded.store(true, Ordering::Release);
    }

    /// Stores the detection if recording; returns true if it was kept.
    pub fn append_detection(&self, detection: Option<Detection>) -> bool {
        self.history().append(detection)
    }

    /// Snapshot of the history, oldest first.
    pub fn history_entries(&self) -> Vec<Detection> {
        self.history().to_vec()
    }

    pub fn history_len(&self) -> usize {
        self.history().len()
    }

    pub fn query_keypoint<E, K>(&self, entry_index: E, keypoint_index: K) -> Option<Keypoint>
    where
        E: TryInto<usize>,
        K: TryInto<usize>,
    {
        self.history().query_keypoint(entry_index, keypoint_index)
    }

    /// Path of the selected landmark through the history; empty if none is selected.
    pub fn track_selected_keypoint(&self) -> Vec<Keypoint> {
        match self.selected_keypoint() {
            Some(index) => self.history().track_keypoint(index),
            None => Vec::new(),
        }
    }

    fn history(&self) -> MutexGuard<'_, HistoryStore> {
        lock(&self.history)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(HistoryStore::default())
    }
}

// A panic on the worker mid-append leaves the store structurally valid.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
