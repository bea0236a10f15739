use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::KEYPOINT_COUNT;

#[derive(Error, Debug, PartialEq)]
pub enum DetectionError {
    #[error("expected {expected} keypoints, got {actual}")]
    KeypointCount { expected: usize, actual: usize },
}

/// A single 3D landmark in frame pixel space (`z` is relative depth).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Keypoint {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Normalized estimator output for one frame.
///
/// Always holds exactly [`KEYPOINT_COUNT`] keypoints; index `i` names the same
/// anatomical landmark in every detection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    timestamp_ms: u64,
    keypoints: Vec<Keypoint>,
    confidence: f64,
}

impl Detection {
    /// Confidence is clamped to `[0, 1]`.
    pub fn new(
        timestamp_ms: u64,
        keypoints: Vec<Keypoint>,
        confidence: f64,
    ) -> Result<Self, DetectionError> {
        if keypoints.len() != KEYPOINT_COUNT {
            return Err(DetectionError::KeypointCount {
                expected: KEYPOINT_COUNT,
                actual: keypoints.len(),
            });
        }
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Ok(Self {
            timestamp_ms,
            keypoints,
            confidence,
        })
    }

    /// Unix epoch milliseconds at which the frame was processed.
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    pub fn keypoint(&self, index: usize) -> Option<Keypoint> {
        self.keypoints.get(index).copied()
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }
}

#[cfg(test)]
pub(crate) fn test_keypoints(seed: f64) -> Vec<Keypoint> {
    (0..KEYPOINT_COUNT)
        .map(|i| Keypoint::new(seed + i as f64, seed * 2.0 + i as f64, -(i as f64) / 100.0))
        .collect()
}
