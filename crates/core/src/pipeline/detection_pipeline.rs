use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::capture::domain::capture_source::CaptureSource;
use crate::detection::domain::detection::Detection;
use crate::detection::domain::face_mesh::FaceMesh;
use crate::detection::domain::landmark_estimator::LandmarkEstimator;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::frame::Frame;

type TimestampSource = Box<dyn Fn() -> u64 + Send>;

/// Result of one pass over a ready frame.
///
/// `face` is the estimator's raw record for the first face, kept so contours
/// are drawn from the same result as the points. `detection` is its
/// normalized form. Both are `None` whenever no valid face was found.
#[derive(Debug)]
pub struct ProcessedFrame {
    pub frame: Frame,
    pub face: Option<FaceMesh>,
    pub detection: Option<Detection>,
}

/// Pulls the current frame, runs the estimator and normalizes the first face.
///
/// Estimator failures never escape: they are logged, counted and the frame
/// comes back without a detection so the loop can move on.
pub struct DetectionPipeline {
    now_ms: TimestampSource,
    estimation_failures: u64,
}

impl DetectionPipeline {
    pub fn new() -> Self {
        Self {
            now_ms: Box::new(unix_time_ms),
            estimation_failures: 0,
        }
    }

    /// Replaces the wall clock used to stamp detections.
    pub fn with_timestamp_source(mut self, now_ms: impl Fn() -> u64 + Send + 'static) -> Self {
        self.now_ms = Box::new(now_ms);
        self
    }

    pub fn estimation_failures(&self) -> u64 {
        self.estimation_failures
    }

    /// Returns `None` when the source has nothing new or the read fails.
    pub fn process_frame(
        &mut self,
        capture: &mut dyn CaptureSource,
        estimator: &mut dyn LandmarkEstimator,
        logger: &mut dyn PipelineLogger,
    ) -> Option<ProcessedFrame> {
        if !capture.is_ready() {
            return None;
        }

        let t0 = Instant::now();
        let frame = match capture.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Failed to read ready frame: {e}");
                return None;
            }
        };
        logger.timing("capture", t0.elapsed().as_secs_f64() * 1000.0);

        let t0 = Instant::now();
        let faces = match estimator.estimate(&frame) {
            Ok(faces) => faces,
            Err(e) => {
                self.estimation_failures += 1;
                log::warn!("Landmark estimation failed on frame {}: {e}", frame.index());
                logger.metric("estimate_failures", 1.0);
                return Some(ProcessedFrame {
                    frame,
                    face: None,
                    detection: None,
                });
            }
        };
        logger.timing("estimate", t0.elapsed().as_secs_f64() * 1000.0);
        logger.metric("faces", faces.len() as f64);

        let face = faces.into_iter().next();
        let detection = face.as_ref().and_then(|face| self.normalize(face));
        // A face that failed normalization is not drawn either.
        let face = face.filter(|_| detection.is_some());

        Some(ProcessedFrame {
            frame,
            face,
            detection,
        })
    }

    fn normalize(&self, face: &FaceMesh) -> Option<Detection> {
        match Detection::new((self.now_ms)(), face.keypoints.clone(), face.confidence) {
            Ok(detection) => Some(detection),
            Err(e) => {
                log::warn!("Discarding face: {e}");
                None
            }
        }
    }
}

impl Default for DetectionPipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn unix_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
